use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::store::CategoryRecord;
use crate::{CategoryKey, Movie, MovieId, ShelfError, UserKey};

/// A named, user-scoped, duplicate-free, order-preserving grouping of movies.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Category {
    name: String,
    description: Option<String>,
    user_key: UserKey,
    members: Vec<MovieId>,
}

impl Category {
    /// Create an empty category.
    ///
    /// # Errors
    /// Returns [`ShelfError::Validation`] when `name` is blank.
    pub fn new(name: impl Into<String>, owner: UserKey) -> Result<Self, ShelfError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, description: None, user_key: owner, members: Vec::new() })
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Rebuild a category from its stored shape, keeping only members accepted by
    /// `resolves` and collapsing repeated references.
    pub(crate) fn from_record(record: CategoryRecord, resolves: impl Fn(MovieId) -> bool) -> Self {
        let mut seen = BTreeSet::new();
        let members = record
            .members
            .into_iter()
            .filter(|movie_id| resolves(*movie_id) && seen.insert(*movie_id))
            .collect();
        Self {
            name: record.name,
            description: record.description,
            user_key: record.user_key,
            members,
        }
    }

    #[must_use]
    pub fn key(&self) -> CategoryKey {
        CategoryKey::from_name(&self.name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    #[must_use]
    pub fn members(&self) -> &[MovieId] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn contains(&self, movie: &Movie) -> bool {
        self.contains_id(movie.id())
    }

    #[must_use]
    pub fn contains_id(&self, movie_id: MovieId) -> bool {
        self.members.contains(&movie_id)
    }

    /// Append `movie` unless it is already a member. Returns whether it was appended.
    pub fn add(&mut self, movie: &Movie) -> bool {
        if self.contains(movie) {
            return false;
        }
        self.members.push(movie.id());
        true
    }

    /// Remove `movie` if present. Returns whether it was removed.
    pub fn remove(&mut self, movie: &Movie) -> bool {
        self.remove_id(movie.id())
    }

    pub(crate) fn remove_id(&mut self, movie_id: MovieId) -> bool {
        match self.members.iter().position(|member| *member == movie_id) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Change the display name. The scoping key changes with it, so owners of an
    /// index keyed by [`Category::key`] must re-index.
    ///
    /// # Errors
    /// Returns [`ShelfError::Validation`] when `new_name` is blank.
    pub fn rename(&mut self, new_name: impl Into<String>) -> Result<(), ShelfError> {
        let new_name = new_name.into();
        validate_name(&new_name)?;
        self.name = new_name;
        Ok(())
    }

    /// Combine two categories into a new one named `self/other`, holding the
    /// members of `self` followed by the members of `other` not already present.
    ///
    /// # Errors
    /// Returns [`ShelfError::Conflict`] when both sides are the same category.
    pub fn merge(&self, other: &Self) -> Result<Self, ShelfError> {
        if self.key() == other.key() {
            return Err(ShelfError::Conflict(format!(
                "cannot combine category `{}` with itself",
                self.name
            )));
        }

        let mut members = self.members.clone();
        for movie_id in &other.members {
            if !members.contains(movie_id) {
                members.push(*movie_id);
            }
        }

        Ok(Self {
            name: format!("{}/{}", self.name, other.name),
            description: None,
            user_key: self.user_key.clone(),
            members,
        })
    }

    #[must_use]
    pub fn to_record(&self) -> CategoryRecord {
        CategoryRecord {
            name: self.name.clone(),
            description: self.description.clone(),
            members: self.members.clone(),
            user_key: self.user_key.clone(),
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

fn validate_name(name: &str) -> Result<(), ShelfError> {
    if name.trim().is_empty() {
        return Err(ShelfError::Validation("category name MUST be non-empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> UserKey {
        UserKey::from_username("alice")
    }

    fn movie(title: &str) -> Movie {
        Movie::new(title, "Director", 2000, owner())
            .unwrap_or_else(|err| panic!("fixture movie should be valid: {err}"))
    }

    fn category(name: &str, movies: &[&Movie]) -> Category {
        let mut category = Category::new(name, owner())
            .unwrap_or_else(|err| panic!("fixture category should be valid: {err}"));
        for movie in movies {
            category.add(movie);
        }
        category
    }

    #[test]
    fn new_rejects_blank_name() {
        assert!(matches!(Category::new("  ", owner()), Err(ShelfError::Validation(_))));
    }

    #[test]
    fn duplicate_add_is_idempotent_and_keeps_first_position() {
        let x = movie("X");
        let y = movie("Y");
        let mut all = category("All Movies", &[&x, &y]);

        assert!(!all.add(&x));
        assert_eq!(all.members(), &[x.id(), y.id()]);
    }

    #[test]
    fn remove_is_a_no_op_when_absent() {
        let x = movie("X");
        let y = movie("Y");
        let mut all = category("All Movies", &[&x]);

        assert!(!all.remove(&y));
        assert!(all.remove(&x));
        assert!(!all.remove(&x));
        assert!(all.is_empty());
    }

    #[test]
    fn rename_changes_scoping_key() -> Result<(), ShelfError> {
        let mut sci_fi = category("Sci-Fi", &[]);
        sci_fi.rename("Science Fiction")?;

        assert_eq!(sci_fi.key(), CategoryKey::from_name("science fiction"));
        assert!(sci_fi.rename("").is_err());
        assert_eq!(sci_fi.name(), "Science Fiction");
        Ok(())
    }

    #[test]
    fn merge_unions_members_in_order_without_touching_inputs() -> Result<(), ShelfError> {
        let a = movie("A");
        let b = movie("B");
        let c = movie("C");
        let left = category("Sci-Fi", &[&a, &b]);
        let right = category("Fantasy", &[&b, &c]);

        let merged = left.merge(&right)?;

        assert_eq!(merged.name(), "Sci-Fi/Fantasy");
        assert_eq!(merged.members(), &[a.id(), b.id(), c.id()]);
        assert_eq!(left.members(), &[a.id(), b.id()]);
        assert_eq!(right.members(), &[b.id(), c.id()]);
        Ok(())
    }

    #[test]
    fn merge_with_itself_is_a_conflict() {
        let sci_fi = category("Sci-Fi", &[]);
        let shouting = category("SCI-FI", &[]);

        assert!(matches!(sci_fi.merge(&sci_fi), Err(ShelfError::Conflict(_))));
        assert!(matches!(sci_fi.merge(&shouting), Err(ShelfError::Conflict(_))));
    }

    #[test]
    fn from_record_drops_unresolved_and_repeated_members() {
        let known = MovieId::new();
        let dangling = MovieId::new();
        let record = CategoryRecord {
            name: "All Movies".to_string(),
            description: None,
            members: vec![known, dangling, known],
            user_key: owner(),
        };

        let category = Category::from_record(record, |movie_id| movie_id == known);

        assert_eq!(category.members(), &[known]);
    }
}
