use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::participant::Participant;
use crate::schema::income_history_entries;

/// Append-only record of a participant's income changing at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Associations, Identifiable, Queryable)]
#[diesel(belongs_to(Participant, foreign_key = participant_id))]
#[diesel(table_name = income_history_entries)]
pub struct IncomeHistoryEntry {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub income: f64,
    pub effective_from: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = income_history_entries)]
pub struct NewIncomeHistoryEntry {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub income: f64,
    pub effective_from: SystemTime,
}

/// Resolves a participant's income as it was at `at`: the latest entry with
/// `effective_from <= at` wins; with no such entry the participant's current
/// income applies (history entries refine the current value, they do not
/// replace it).
pub fn income_at<'a, I>(entries: I, current_income: f64, at: SystemTime) -> f64
where
    I: IntoIterator<Item = &'a IncomeHistoryEntry>,
{
    let mut latest_applicable: Option<&IncomeHistoryEntry> = None;

    for entry in entries {
        if entry.effective_from > at {
            continue;
        }

        match latest_applicable {
            Some(current) if entry.effective_from <= current.effective_from => (),
            _ => latest_applicable = Some(entry),
        }
    }

    latest_applicable.map_or(current_income, |e| e.income)
}
