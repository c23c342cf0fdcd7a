use serde::{Deserialize, Serialize};

use crate::{CategoryKey, MovieId, StoreError, UserKey};

/// Stored shape of one movie.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct MovieRecord {
    pub movie_id: MovieId,
    pub title: String,
    pub director: String,
    pub year: i32,
    #[serde(default)]
    pub series_name: Option<String>,
    pub user_key: UserKey,
}

/// Mutable subset of a [`MovieRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct MovieFields {
    pub title: String,
    pub director: String,
    pub year: i32,
    #[serde(default)]
    pub series_name: Option<String>,
}

/// Stored shape of one category. Members reference [`MovieRecord::movie_id`] in
/// display order.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CategoryRecord {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<MovieId>,
    pub user_key: UserKey,
}

/// Persistence contract consumed by [`crate::Shelf`].
///
/// Category names are matched case-insensitively. Count-returning writes report
/// how many rows changed so callers can tell a no-op from a miss.
pub trait RecordStore {
    /// # Errors
    /// Returns [`StoreError`] when the backing store cannot be read.
    fn find_movies(&self, user_key: &UserKey) -> Result<Vec<MovieRecord>, StoreError>;

    /// # Errors
    /// Returns [`StoreError`] when the backing store cannot be read.
    fn find_categories(&self, user_key: &UserKey) -> Result<Vec<CategoryRecord>, StoreError>;

    /// Persist a new movie and file it under `filed_under` as one atomic write.
    ///
    /// A category the user has no row for is created from `filed_under`,
    /// members included; otherwise the movie is appended to the existing one.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the write fails; nothing is persisted then.
    fn insert_movie(
        &mut self,
        record: &MovieRecord,
        filed_under: &CategoryRecord,
    ) -> Result<MovieId, StoreError>;

    /// # Errors
    /// Returns [`StoreError`] when the write fails.
    fn update_movie(
        &mut self,
        user_key: &UserKey,
        movie_id: MovieId,
        fields: &MovieFields,
    ) -> Result<usize, StoreError>;

    /// Persist a category together with any members it already carries.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the write fails.
    fn insert_category(&mut self, record: &CategoryRecord) -> Result<CategoryKey, StoreError>;

    /// # Errors
    /// Returns [`StoreError`] when the write fails.
    fn delete_category(&mut self, user_key: &UserKey, name: &str) -> Result<usize, StoreError>;

    /// # Errors
    /// Returns [`StoreError`] when the write fails.
    fn rename_category(
        &mut self,
        user_key: &UserKey,
        name: &str,
        new_name: &str,
    ) -> Result<usize, StoreError>;

    /// Append a member with set semantics: an existing member is left in place.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the write fails.
    fn add_member(
        &mut self,
        user_key: &UserKey,
        category_name: &str,
        movie_id: MovieId,
    ) -> Result<usize, StoreError>;

    /// # Errors
    /// Returns [`StoreError`] when the write fails.
    fn remove_member(
        &mut self,
        user_key: &UserKey,
        category_name: &str,
        movie_id: MovieId,
    ) -> Result<usize, StoreError>;
}

/// Resolves the user a request acts for.
pub trait SessionContext {
    fn current_user_key(&self) -> Option<UserKey>;
}

impl SessionContext for Option<UserKey> {
    fn current_user_key(&self) -> Option<UserKey> {
        self.clone()
    }
}
