#![cfg(not(doctest))]

#[macro_use]
extern crate diesel;

pub mod allocation;
pub mod db;
pub mod email;
pub mod models;
pub mod request_io;
pub mod schema;
pub mod validators;
