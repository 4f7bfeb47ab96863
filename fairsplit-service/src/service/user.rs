use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use fairsplit_common::db::{DaoError, Repository};
use fairsplit_common::models::user::{NewUser, User, UserRole};
use fairsplit_common::request_io::{InputEditUser, InputUser};
use fairsplit_common::validators;

use crate::auth::AuthenticatedUser;
use crate::error::{db_error, ServiceError};
use crate::service::activity::ActivityRecorder;

pub struct UserService {
    repo: Arc<dyn Repository>,
    activity: ActivityRecorder,
}

impl UserService {
    pub fn new(repo: Arc<dyn Repository>, activity: ActivityRecorder) -> Self {
        Self { repo, activity }
    }

    /// Registers a user. The email is normalized to lowercase before it is
    /// stored; uniqueness is case-insensitive. The credential arrives
    /// already derived and is stored opaquely.
    pub fn register(&self, input: &InputUser) -> Result<User, ServiceError> {
        if let Some(message) = input.validate_email_address().into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        if let Some(message) = validators::validate_name(&input.name).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        if let Some(message) = validators::validate_amount(input.default_income).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        let email = input.email.to_lowercase();
        let credential_salt: [u8; 16] = rand::random();

        let new_user = NewUser {
            id: Uuid::now_v7(),
            email: &email,
            name: &input.name,
            credential_hash: &input.credential,
            credential_salt: &credential_salt,
            role: UserRole::User.as_i16(),
            default_income: input.default_income,
            created_at: SystemTime::now(),
        };

        match self.repo.create_user(&new_user) {
            Ok(()) => (),
            Err(DaoError::AlreadyExists) => {
                return Err(ServiceError::Conflict(String::from(
                    "A user with this email already exists",
                )))
            }
            Err(e) => return Err(db_error(e, "user")),
        }

        self.repo
            .get_user_by_id(new_user.id)
            .map_err(|e| db_error(e, "user"))
    }

    pub fn get_profile(&self, caller: &AuthenticatedUser) -> Result<User, ServiceError> {
        self.repo
            .get_user_by_id(caller.user_id)
            .map_err(|e| db_error(e, "user"))
    }

    pub fn update_profile(
        &self,
        caller: &AuthenticatedUser,
        input: &InputEditUser,
    ) -> Result<(), ServiceError> {
        if let Some(message) = validators::validate_name(&input.name).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        if let Some(message) = validators::validate_amount(input.default_income).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        self.repo
            .update_user_profile(caller.user_id, &input.name, input.default_income)
            .map_err(|e| db_error(e, "user"))?;

        self.activity.record(
            caller,
            "user.update_profile",
            "user",
            Some(caller.user_id),
            None,
            serde_json::json!({ "name": input.name, "default_income": input.default_income }),
        );

        Ok(())
    }
}
