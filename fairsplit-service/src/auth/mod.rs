use uuid::Uuid;

use crate::error::ServiceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    User,
    Admin,
}

/// The caller identity every operation receives. Produced by whatever
/// authentication surface fronts this crate; operations trust it blindly.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub privilege: Privilege,
}

/// Contract the (out of scope) transport layer implements to turn presented
/// credentials into an `AuthenticatedUser`.
pub trait VerifyCredentials: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser, ServiceError>;
}

/// Verifier backed by a fixed token-to-identity table. Exercises the
/// contract in tests and local tooling.
#[derive(Default)]
pub struct StaticTokenVerifier {
    identities: Vec<(String, AuthenticatedUser)>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: String, identity: AuthenticatedUser) {
        self.identities.push((token, identity));
    }
}

impl VerifyCredentials for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser, ServiceError> {
        self.identities
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, identity)| identity.clone())
            .ok_or(ServiceError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token_verifier() {
        let mut verifier = StaticTokenVerifier::new();
        verifier.insert(
            String::from("goodtoken"),
            AuthenticatedUser {
                user_id: Uuid::now_v7(),
                email: String::from("person@example.com"),
                privilege: Privilege::User,
            },
        );

        let identity = verifier.verify("goodtoken").unwrap();
        assert_eq!(identity.email, "person@example.com");

        assert!(matches!(
            verifier.verify("badtoken"),
            Err(ServiceError::Unauthenticated)
        ));
    }
}
