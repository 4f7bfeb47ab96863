use uuid::Uuid;

use crate::db::memory::MemoryRepository;
use crate::db::repository::ActivityStore;
use crate::db::DaoError;
use crate::models::activity_entry::{ActivityEntry, NewActivityEntry};

impl ActivityStore for MemoryRepository {
    fn record_activity(&self, entry: &NewActivityEntry) -> Result<(), DaoError> {
        self.write_state().activity_entries.push(ActivityEntry {
            id: entry.id,
            user_id: entry.user_id,
            budget_id: entry.budget_id,
            action: entry.action.to_owned(),
            entity_type: entry.entity_type.to_owned(),
            entity_id: entry.entity_id,
            payload: entry.payload.to_owned(),
            created_at: entry.created_at,
        });

        Ok(())
    }

    fn list_activity_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<ActivityEntry>, usize), DaoError> {
        let state = self.read_state();

        let mut user_entries: Vec<ActivityEntry> = state
            .activity_entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        user_entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total_count = user_entries.len();
        let offset = page.saturating_sub(1) as usize * page_size as usize;

        let page_entries = user_entries
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Ok((page_entries, total_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{Duration, SystemTime};

    #[test]
    fn test_list_activity_for_user_paginates_newest_first() {
        let repo = MemoryRepository::new();
        let user_id = Uuid::now_v7();
        let base_time = SystemTime::now();

        for i in 0..5u64 {
            repo.record_activity(&NewActivityEntry {
                id: Uuid::now_v7(),
                user_id,
                budget_id: None,
                action: "budget.create",
                entity_type: "budget",
                entity_id: Some(Uuid::now_v7()),
                payload: &format!("{{\"n\":{i}}}"),
                created_at: base_time + Duration::from_secs(i),
            })
            .unwrap();
        }

        let (first_page, total_count) = repo.list_activity_for_user(user_id, 1, 2).unwrap();
        assert_eq!(total_count, 5);
        assert_eq!(first_page.len(), 2);
        assert_eq!(first_page[0].created_at, base_time + Duration::from_secs(4));
        assert_eq!(first_page[1].created_at, base_time + Duration::from_secs(3));

        let (last_page, _) = repo.list_activity_for_user(user_id, 3, 2).unwrap();
        assert_eq!(last_page.len(), 1);
        assert_eq!(last_page[0].created_at, base_time);

        let (other_user_page, other_total) =
            repo.list_activity_for_user(Uuid::now_v7(), 1, 10).unwrap();
        assert!(other_user_page.is_empty());
        assert_eq!(other_total, 0);
    }
}
