//! DJ rotation ring.
//!
//! DESIGN
//! ======
//! The rotation is an explicit ring over session ids with `rotate()` and
//! `peek()`. A session appears at most once; every mutating method re-checks
//! that invariant, and deserialization rejects duplicates so a replicated
//! copy can never hold a state the server could not produce.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::model::SessionId;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("session {0} appears more than once in the DJ queue")]
    Duplicate(SessionId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SessionId>", into = "Vec<SessionId>")]
pub struct DjQueue {
    entries: VecDeque<SessionId>,
}

impl DjQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry == id)
    }

    /// Zero-based position in the rotation, front first.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry == id)
    }

    /// The session whose turn is next (or current, while it plays).
    #[must_use]
    pub fn peek(&self) -> Option<&SessionId> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionId> {
        self.entries.iter()
    }

    /// Append at the back. Returns `false` if already queued.
    pub fn push(&mut self, id: impl Into<SessionId>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.entries.push_back(id);
        self.debug_check();
        true
    }

    /// Remove a session wherever it sits. Returns `false` if absent.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        self.entries.remove(index);
        self.debug_check();
        true
    }

    /// Move the front entry to the back.
    pub fn rotate(&mut self) {
        if self.entries.len() > 1 {
            self.entries.rotate_left(1);
        }
        self.debug_check();
    }

    /// Verify the no-duplicate invariant.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Duplicate`] naming the first repeated session.
    pub fn check(&self) -> Result<(), QueueError> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !seen.insert(entry.as_str()) {
                return Err(QueueError::Duplicate(entry.clone()));
            }
        }
        Ok(())
    }

    fn debug_check(&self) {
        debug_assert!(self.check().is_ok(), "dj queue invariant violated: {:?}", self.entries);
    }
}

impl TryFrom<Vec<SessionId>> for DjQueue {
    type Error = QueueError;

    fn try_from(entries: Vec<SessionId>) -> Result<Self, Self::Error> {
        let queue = Self { entries: entries.into() };
        queue.check()?;
        Ok(queue)
    }
}

impl From<DjQueue> for Vec<SessionId> {
    fn from(queue: DjQueue) -> Self {
        queue.entries.into()
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
