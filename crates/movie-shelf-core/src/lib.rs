use std::borrow::Borrow;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

mod category;
mod movie;
mod shelf;
mod store;

pub use category::Category;
pub use movie::{parse_release_year, Movie, MovieInput, MIN_RELEASE_YEAR};
pub use shelf::{Shelf, ALL_MOVIES};
pub use store::{CategoryRecord, MovieFields, MovieRecord, RecordStore, SessionContext};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ShelfError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure reported by a [`RecordStore`] implementation.
///
/// The message carries the adapter's full context chain; the shelf forwards it
/// to the caller unchanged.
#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
#[error("store error: {message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Partition key for all per-user data: the lowercase username.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    #[must_use]
    pub fn from_username(username: &str) -> Self {
        Self(username.trim().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a movie record. Survives title and director edits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MovieId(pub Ulid);

impl MovieId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MovieId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MovieId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `director + ": " + title`, case-sensitive as entered.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct MovieKey(String);

impl MovieKey {
    #[must_use]
    pub fn new(director: &str, title: &str) -> Self {
        Self(format!("{director}: {title}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MovieKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for MovieKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase category name, the scoping key of a category within one user.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct CategoryKey(String);

impl CategoryKey {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
