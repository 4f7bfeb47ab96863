use diesel::{dsl, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::postgres::{lower, PostgresRepository};
use crate::db::repository::UserStore;
use crate::db::DaoError;
use crate::models::user::{NewUser, User};
use crate::schema::users as user_fields;
use crate::schema::users::dsl::users;

impl UserStore for PostgresRepository {
    fn create_user(&self, user: &NewUser) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let existing = users
                    .filter(lower(user_fields::email).eq(user.email.to_lowercase()))
                    .select(user_fields::id)
                    .first::<Uuid>(conn)
                    .optional()?;

                if existing.is_some() {
                    return Err(DaoError::AlreadyExists);
                }

                dsl::insert_into(users).values(user).execute(conn)?;

                Ok(())
            })
    }

    fn get_user_by_id(&self, user_id: Uuid) -> Result<User, DaoError> {
        Ok(users
            .find(user_id)
            .get_result::<User>(&mut self.db_thread_pool.get()?)?)
    }

    fn get_user_by_email(&self, email: &str) -> Result<User, DaoError> {
        Ok(users
            .filter(lower(user_fields::email).eq(email.to_lowercase()))
            .first::<User>(&mut self.db_thread_pool.get()?)?)
    }

    fn update_user_profile(
        &self,
        user_id: Uuid,
        name: &str,
        default_income: f64,
    ) -> Result<(), DaoError> {
        let affected_row_count = diesel::update(users.find(user_id))
            .set((
                user_fields::name.eq(name),
                user_fields::default_income.eq(default_income),
            ))
            .execute(&mut self.db_thread_pool.get()?)?;

        if affected_row_count == 0 {
            return Err(DaoError::NotFound);
        }

        Ok(())
    }
}
