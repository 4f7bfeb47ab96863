use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::users;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_i16(self) -> i16 {
        match self {
            UserRole::User => 0,
            UserRole::Admin => 1,
        }
    }
}

impl TryFrom<i16> for UserRole {
    type Error = i16;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(UserRole::User),
            1 => Ok(UserRole::Admin),
            other => Err(other),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, QueryableByName)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,

    pub email: String,
    pub name: String,

    // Opaque to this crate; produced and verified by the credential layer
    #[serde(skip_serializing)]
    pub credential_hash: String,
    #[serde(skip_serializing)]
    pub credential_salt: Vec<u8>,

    pub role: i16,
    pub default_income: f64,

    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUser<'a> {
    pub id: Uuid,

    pub email: &'a str,
    pub name: &'a str,

    pub credential_hash: &'a str,
    pub credential_salt: &'a [u8],

    pub role: i16,
    pub default_income: f64,

    pub created_at: SystemTime,
}
