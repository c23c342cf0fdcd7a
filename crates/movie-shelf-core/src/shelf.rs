use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::store::RecordStore;
use crate::{Category, CategoryKey, Movie, MovieId, MovieInput, MovieKey, ShelfError, UserKey};

/// Name of the category every user has and every new movie joins.
pub const ALL_MOVIES: &str = "All Movies";

const ALL_MOVIES_DESCRIPTION: &str = "genre with all movies.";

/// One user's movies and categories, kept in agreement with a [`RecordStore`].
///
/// Every mutating operation validates and checks for conflicts first, then writes
/// through the store, and only touches the in-memory graph once the write
/// succeeded. A failed write leaves the shelf exactly as it was. A write the
/// store reports as matching nothing reloads the shelf from the store instead.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Shelf {
    user_key: UserKey,
    movies: BTreeMap<MovieKey, Movie>,
    keys_by_id: BTreeMap<MovieId, MovieKey>,
    categories: BTreeMap<CategoryKey, Category>,
}

impl Shelf {
    /// Build the graph for `user_key` from the store.
    ///
    /// Category members that reference no movie of this user are dropped.
    ///
    /// # Errors
    /// Returns [`ShelfError::Store`] when the store cannot be read.
    pub fn load<S>(store: &S, user_key: UserKey) -> Result<Self, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let mut movies = BTreeMap::new();
        let mut keys_by_id = BTreeMap::new();
        for record in store.find_movies(&user_key)? {
            let movie = Movie::from_record(record);
            if let Entry::Vacant(slot) = movies.entry(movie.key()) {
                keys_by_id.insert(movie.id(), movie.key());
                slot.insert(movie);
            }
        }

        let mut categories = BTreeMap::new();
        for record in store.find_categories(&user_key)? {
            let category =
                Category::from_record(record, |movie_id| keys_by_id.contains_key(&movie_id));
            categories.entry(category.key()).or_insert(category);
        }

        Ok(Self { user_key, movies, keys_by_id, categories })
    }

    /// Discard the in-memory graph and reload it from the store.
    ///
    /// # Errors
    /// Returns [`ShelfError::Store`] when the store cannot be read; the current
    /// graph is kept in that case.
    pub fn refresh<S>(&mut self, store: &S) -> Result<(), ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        *self = Self::load(store, self.user_key.clone())?;
        Ok(())
    }

    #[must_use]
    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    #[must_use]
    pub fn movie(&self, key: &str) -> Option<&Movie> {
        self.movies.get(key)
    }

    #[must_use]
    pub fn movie_by_id(&self, movie_id: MovieId) -> Option<&Movie> {
        self.keys_by_id.get(&movie_id).and_then(|key| self.movies.get(key))
    }

    /// Movies ordered by key.
    pub fn movies(&self) -> impl Iterator<Item = &Movie> {
        self.movies.values()
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.get(&CategoryKey::from_name(name))
    }

    /// Categories ordered by lowercase name.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    /// Members of a category resolved to movies, in display order.
    ///
    /// # Errors
    /// Returns [`ShelfError::NotFound`] when the category does not exist.
    pub fn category_movies(&self, name: &str) -> Result<Vec<&Movie>, ShelfError> {
        let category = self.require_category(name)?;
        Ok(category.members().iter().filter_map(|movie_id| self.movie_by_id(*movie_id)).collect())
    }

    /// Categories that list the movie with `movie_key`.
    #[must_use]
    pub fn categories_of(&self, movie_key: &str) -> Vec<&Category> {
        let Some(movie) = self.movies.get(movie_key) else {
            return Vec::new();
        };
        self.categories.values().filter(|category| category.contains(movie)).collect()
    }

    /// Add a new movie and file it under [`ALL_MOVIES`], creating that category
    /// when the user has none.
    ///
    /// The movie row and its [`ALL_MOVIES`] membership go to the store in one
    /// write, so they are committed or rejected together.
    ///
    /// # Errors
    /// Returns [`ShelfError::Validation`] for malformed input,
    /// [`ShelfError::Conflict`] when a movie with the same key exists, or
    /// [`ShelfError::Store`] when the write fails.
    pub fn add_movie<S>(&mut self, store: &mut S, input: &MovieInput) -> Result<&Movie, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let movie = Movie::from_input(input, self.user_key.clone())?;
        let key = movie.key();
        if self.movies.contains_key(&key) {
            return Err(ShelfError::Conflict(format!("movie `{key}` already exists")));
        }

        let mut all_movies = match self.category(ALL_MOVIES) {
            Some(existing) => existing.clone(),
            None => self.new_all_movies()?,
        };
        all_movies.add(&movie);
        store.insert_movie(&movie.to_record(), &all_movies.to_record())?;

        self.keys_by_id.insert(movie.id(), key.clone());
        self.movies.insert(key.clone(), movie);
        self.categories.insert(all_movies.key(), all_movies);
        self.require_movie(key.as_str())
    }

    /// Replace title, director, year, and series name of an existing movie.
    ///
    /// Category membership follows the movie's stable id, so every category that
    /// listed the movie lists it under its new key afterwards.
    ///
    /// # Errors
    /// Returns [`ShelfError::NotFound`] when `current_key` is unknown or the store
    /// no longer holds the record, [`ShelfError::Validation`] for malformed input,
    /// [`ShelfError::Conflict`] when the new key belongs to another movie, or
    /// [`ShelfError::Store`] when the write fails.
    pub fn update_movie<S>(
        &mut self,
        store: &mut S,
        current_key: &str,
        input: &MovieInput,
    ) -> Result<&Movie, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let mut updated = self.require_movie(current_key)?.clone();
        updated.apply(input)?;
        let new_key = updated.key();
        if new_key.as_str() != current_key && self.movies.contains_key(&new_key) {
            return Err(ShelfError::Conflict(format!("movie `{new_key}` already exists")));
        }

        let modified = store.update_movie(&self.user_key, updated.id(), &updated.fields())?;
        if modified == 0 {
            let missing = format!("movie `{current_key}` is no longer in the store");
            return Err(self.resync(&*store, missing));
        }

        self.movies.remove(current_key);
        self.keys_by_id.insert(updated.id(), new_key.clone());
        self.movies.insert(new_key.clone(), updated);
        self.require_movie(new_key.as_str())
    }

    /// # Errors
    /// Returns [`ShelfError::Validation`] for a blank name,
    /// [`ShelfError::Conflict`] when the name is taken (ignoring case), or
    /// [`ShelfError::Store`] when the write fails.
    pub fn create_category<S>(&mut self, store: &mut S, name: &str) -> Result<&Category, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let category = Category::new(name, self.user_key.clone())?;
        self.insert_category(store, category)
    }

    /// Remove a category. Its members stay in the movie index and in every other
    /// category.
    ///
    /// # Errors
    /// Returns [`ShelfError::NotFound`] when the category does not exist,
    /// [`ShelfError::Conflict`] for [`ALL_MOVIES`], or [`ShelfError::Store`] when
    /// the write fails.
    pub fn delete_category<S>(&mut self, store: &mut S, name: &str) -> Result<Category, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let key = self.require_category(name)?.key();
        if key == CategoryKey::from_name(ALL_MOVIES) {
            return Err(ShelfError::Conflict(format!("`{ALL_MOVIES}` cannot be deleted")));
        }

        let stored_name = self.require_category(name)?.name().to_string();
        if store.delete_category(&self.user_key, &stored_name)? == 0 {
            let missing = format!("category `{name}` is no longer in the store");
            return Err(self.resync(&*store, missing));
        }
        self.categories
            .remove(&key)
            .ok_or_else(|| ShelfError::NotFound(format!("category `{name}`")))
    }

    /// # Errors
    /// Returns [`ShelfError::NotFound`] when the category does not exist,
    /// [`ShelfError::Validation`] for a blank new name, [`ShelfError::Conflict`]
    /// when the new name is taken or the category is [`ALL_MOVIES`], or
    /// [`ShelfError::Store`] when the write fails.
    pub fn rename_category<S>(
        &mut self,
        store: &mut S,
        name: &str,
        new_name: &str,
    ) -> Result<&Category, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let mut renamed = self.require_category(name)?.clone();
        let old_key = renamed.key();
        if old_key == CategoryKey::from_name(ALL_MOVIES) {
            return Err(ShelfError::Conflict(format!("`{ALL_MOVIES}` cannot be renamed")));
        }

        let old_name = renamed.name().to_string();
        renamed.rename(new_name)?;
        let new_key = renamed.key();
        if new_key != old_key && self.categories.contains_key(&new_key) {
            return Err(ShelfError::Conflict(format!("category `{new_name}` already exists")));
        }

        if store.rename_category(&self.user_key, &old_name, new_name)? == 0 {
            let missing = format!("category `{name}` is no longer in the store");
            return Err(self.resync(&*store, missing));
        }
        self.categories.remove(&old_key);
        Ok(self.categories.entry(new_key).or_insert(renamed))
    }

    /// Put a movie in a category. Adding an existing member changes nothing and
    /// issues no write.
    ///
    /// When the store reports that nothing changed, the shelf is reloaded from
    /// it. A category gone from the store is then reported as missing, and a
    /// membership already present there as no change.
    ///
    /// # Errors
    /// Returns [`ShelfError::NotFound`] when the category or the movie does not
    /// exist, or [`ShelfError::Store`] when the write fails.
    pub fn add_to_category<S>(
        &mut self,
        store: &mut S,
        category_name: &str,
        movie_key: &str,
    ) -> Result<bool, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let category = self.require_category(category_name)?;
        let movie = self.require_movie(movie_key)?;
        if category.contains(movie) {
            return Ok(false);
        }

        let (category_key, stored_name, movie) =
            (category.key(), category.name().to_string(), movie.clone());
        if store.add_member(&self.user_key, &stored_name, movie.id())? == 0 {
            self.resync_category(&*store, category_name)?;
            self.require_movie(movie_key)?;
            return Ok(false);
        }
        let category = self
            .categories
            .get_mut(&category_key)
            .ok_or_else(|| ShelfError::NotFound(format!("category `{category_name}`")))?;
        Ok(category.add(&movie))
    }

    /// Take a movie out of a category. Unknown or non-member movies are a no-op.
    ///
    /// A removal the store reports as a no-op reloads the shelf, as for
    /// [`Shelf::add_to_category`].
    ///
    /// # Errors
    /// Returns [`ShelfError::NotFound`] when the category does not exist, or
    /// [`ShelfError::Store`] when the write fails.
    pub fn remove_from_category<S>(
        &mut self,
        store: &mut S,
        category_name: &str,
        movie_key: &str,
    ) -> Result<bool, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let category = self.require_category(category_name)?;
        let Some(movie) = self.movies.get(movie_key) else {
            return Ok(false);
        };
        if !category.contains(movie) {
            return Ok(false);
        }

        let (category_key, stored_name, movie) =
            (category.key(), category.name().to_string(), movie.clone());
        if store.remove_member(&self.user_key, &stored_name, movie.id())? == 0 {
            self.resync_category(&*store, category_name)?;
            return Ok(false);
        }
        let category = self
            .categories
            .get_mut(&category_key)
            .ok_or_else(|| ShelfError::NotFound(format!("category `{category_name}`")))?;
        Ok(category.remove(&movie))
    }

    /// Persist the merge of two categories as a new category. Both sources are
    /// kept as they are.
    ///
    /// # Errors
    /// Returns [`ShelfError::Conflict`] when both names denote the same category
    /// or the merged name is taken, [`ShelfError::NotFound`] when either source
    /// does not exist, or [`ShelfError::Store`] when the write fails.
    pub fn combine_categories<S>(
        &mut self,
        store: &mut S,
        first: &str,
        second: &str,
    ) -> Result<&Category, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        if CategoryKey::from_name(first) == CategoryKey::from_name(second) {
            return Err(ShelfError::Conflict(format!(
                "cannot combine category `{first}` with itself"
            )));
        }

        let merged = self.require_category(first)?.merge(self.require_category(second)?)?;
        self.insert_category(store, merged)
    }

    /// Create [`ALL_MOVIES`] holding every movie when the user has no such
    /// category. Returns whether it was created.
    ///
    /// # Errors
    /// Returns [`ShelfError::Store`] when the write fails.
    pub fn ensure_all_movies<S>(&mut self, store: &mut S) -> Result<bool, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        if self.category(ALL_MOVIES).is_some() {
            return Ok(false);
        }

        let all_movies = self.new_all_movies()?;
        self.insert_category(store, all_movies)?;
        Ok(true)
    }

    /// A fresh [`ALL_MOVIES`] category listing every movie on the shelf.
    fn new_all_movies(&self) -> Result<Category, ShelfError> {
        let mut all_movies = Category::new(ALL_MOVIES, self.user_key.clone())?
            .with_description(ALL_MOVIES_DESCRIPTION);
        for movie in self.movies.values() {
            all_movies.add(movie);
        }
        Ok(all_movies)
    }

    /// Reload after the store matched no row for a write the graph expected to
    /// apply, and report `missing` as not found.
    fn resync<S>(&mut self, store: &S, missing: String) -> ShelfError
    where
        S: RecordStore + ?Sized,
    {
        match self.refresh(store) {
            Ok(()) => ShelfError::NotFound(missing),
            Err(err) => err,
        }
    }

    fn resync_category<S>(&mut self, store: &S, name: &str) -> Result<(), ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        self.refresh(store)?;
        self.require_category(name).map(|_| ())
    }

    fn insert_category<S>(
        &mut self,
        store: &mut S,
        category: Category,
    ) -> Result<&Category, ShelfError>
    where
        S: RecordStore + ?Sized,
    {
        let key = category.key();
        if self.categories.contains_key(&key) {
            return Err(ShelfError::Conflict(format!(
                "category `{}` already exists",
                category.name()
            )));
        }

        store.insert_category(&category.to_record())?;
        Ok(self.categories.entry(key).or_insert(category))
    }

    fn require_movie(&self, key: &str) -> Result<&Movie, ShelfError> {
        self.movies.get(key).ok_or_else(|| ShelfError::NotFound(format!("movie `{key}`")))
    }

    fn require_category(&self, name: &str) -> Result<&Category, ShelfError> {
        self.category(name).ok_or_else(|| ShelfError::NotFound(format!("category `{name}`")))
    }
}
