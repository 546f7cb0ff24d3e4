//! Room passwords.
//!
//! A protected room keeps only the bcrypt hash of its password. Join
//! requests are checked against it before the websocket upgrade.

use crate::room::RoomError;

/// Lowest and highest cost bcrypt accepts.
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash `password` with a fresh salt at the given bcrypt `cost`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::PasswordHash`] when bcrypt rejects the cost.
    pub fn new(password: &str, cost: u32) -> Result<Self, RoomError> {
        Ok(Self(bcrypt::hash(password, cost)?))
    }

    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        match bcrypt::verify(candidate, &self.0) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "auth: stored password hash unreadable");
                false
            }
        }
    }
}

/// Gate a join. Open rooms accept anything; protected rooms need the
/// matching password.
pub fn check_password(expected: Option<&PasswordHash>, supplied: Option<&str>) -> Result<(), RoomError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match supplied.filter(|p| !p.is_empty()) {
        None => Err(RoomError::PasswordRequired),
        Some(candidate) if expected.verify(candidate) => Ok(()),
        Some(_) => Err(RoomError::PasswordIncorrect),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
