pub mod activity_entry;
pub mod budget;
pub mod budget_member;
pub mod income_history_entry;
pub mod invite;
pub mod participant;
pub mod transaction;
pub mod user;
