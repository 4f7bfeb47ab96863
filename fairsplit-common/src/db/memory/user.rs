use uuid::Uuid;

use crate::db::memory::MemoryRepository;
use crate::db::repository::UserStore;
use crate::db::DaoError;
use crate::models::user::{NewUser, User};

impl UserStore for MemoryRepository {
    fn create_user(&self, user: &NewUser) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let email_lower = user.email.to_lowercase();

        if state
            .users
            .values()
            .any(|u| u.email.to_lowercase() == email_lower)
        {
            return Err(DaoError::AlreadyExists);
        }

        state.users.insert(
            user.id,
            User {
                id: user.id,
                email: user.email.to_owned(),
                name: user.name.to_owned(),
                credential_hash: user.credential_hash.to_owned(),
                credential_salt: user.credential_salt.to_owned(),
                role: user.role,
                default_income: user.default_income,
                created_at: user.created_at,
            },
        );

        Ok(())
    }

    fn get_user_by_id(&self, user_id: Uuid) -> Result<User, DaoError> {
        self.read_state()
            .users
            .get(&user_id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    fn get_user_by_email(&self, email: &str) -> Result<User, DaoError> {
        let email_lower = email.to_lowercase();

        self.read_state()
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email_lower)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    fn update_user_profile(
        &self,
        user_id: Uuid,
        name: &str,
        default_income: f64,
    ) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let user = state.users.get_mut(&user_id).ok_or(DaoError::NotFound)?;
        user.name = name.to_owned();
        user.default_income = default_income;

        Ok(())
    }
}
