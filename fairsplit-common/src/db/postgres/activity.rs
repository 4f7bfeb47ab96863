use diesel::{dsl, ExpressionMethods, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::postgres::PostgresRepository;
use crate::db::repository::ActivityStore;
use crate::db::DaoError;
use crate::models::activity_entry::{ActivityEntry, NewActivityEntry};
use crate::schema::activity_entries as activity_fields;
use crate::schema::activity_entries::dsl::activity_entries;

impl ActivityStore for PostgresRepository {
    fn record_activity(&self, entry: &NewActivityEntry) -> Result<(), DaoError> {
        dsl::insert_into(activity_entries)
            .values(entry)
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }

    fn list_activity_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<ActivityEntry>, usize), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let total_count: i64 = activity_entries
                    .filter(activity_fields::user_id.eq(user_id))
                    .count()
                    .get_result(conn)?;

                let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);

                let entries = activity_entries
                    .filter(activity_fields::user_id.eq(user_id))
                    .order(activity_fields::created_at.desc())
                    .offset(offset)
                    .limit(i64::from(page_size))
                    .load::<ActivityEntry>(conn)?;

                Ok((entries, total_count as usize))
            })
    }
}
