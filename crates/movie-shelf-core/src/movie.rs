use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::store::{MovieFields, MovieRecord};
use crate::{MovieId, MovieKey, ShelfError, UserKey};

/// Earliest release year accepted for a movie.
pub const MIN_RELEASE_YEAR: i32 = 1880;

/// Plain-data description of a movie as entered by a user.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct MovieInput {
    pub title: String,
    pub director: String,
    pub release_year: i32,
    #[serde(default)]
    pub series_name: Option<String>,
}

impl MovieInput {
    #[must_use]
    pub fn new(title: &str, director: &str, release_year: i32) -> Self {
        Self {
            title: title.to_string(),
            director: director.to_string(),
            release_year,
            series_name: None,
        }
    }

    #[must_use]
    pub fn with_series_name(mut self, series_name: &str) -> Self {
        self.series_name = Some(series_name.to_string());
        self
    }

    #[must_use]
    pub fn key(&self) -> MovieKey {
        MovieKey::new(&self.director, &self.title)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Movie {
    id: MovieId,
    title: String,
    director: String,
    release_year: i32,
    user_key: UserKey,
    series_name: Option<String>,
}

impl Movie {
    /// Create a movie owned by `owner` with a freshly generated identifier.
    ///
    /// # Errors
    /// Returns [`ShelfError::Validation`] when the title or director is blank, or
    /// the release year is earlier than [`MIN_RELEASE_YEAR`].
    pub fn new(
        title: impl Into<String>,
        director: impl Into<String>,
        release_year: i32,
        owner: UserKey,
    ) -> Result<Self, ShelfError> {
        let title = title.into();
        let director = director.into();
        validate(&title, &director, release_year)?;
        Ok(Self {
            id: MovieId::new(),
            title,
            director,
            release_year,
            user_key: owner,
            series_name: None,
        })
    }

    /// Create a movie from user input, carrying the optional series name.
    ///
    /// # Errors
    /// Same as [`Movie::new`].
    pub fn from_input(input: &MovieInput, owner: UserKey) -> Result<Self, ShelfError> {
        let mut movie =
            Self::new(input.title.clone(), input.director.clone(), input.release_year, owner)?;
        movie.series_name.clone_from(&input.series_name);
        Ok(movie)
    }

    pub(crate) fn from_record(record: MovieRecord) -> Self {
        Self {
            id: record.movie_id,
            title: record.title,
            director: record.director,
            release_year: record.year,
            user_key: record.user_key,
            series_name: record.series_name,
        }
    }

    /// Change title, director, and release year in place. The owner never changes.
    ///
    /// # Errors
    /// Returns [`ShelfError::Validation`] under the same rules as [`Movie::new`];
    /// the movie is left untouched in that case.
    pub fn update(
        &mut self,
        title: impl Into<String>,
        director: impl Into<String>,
        release_year: i32,
    ) -> Result<(), ShelfError> {
        let title = title.into();
        let director = director.into();
        validate(&title, &director, release_year)?;
        self.title = title;
        self.director = director;
        self.release_year = release_year;
        Ok(())
    }

    /// Apply every field of `input`, including the series name.
    ///
    /// # Errors
    /// Same as [`Movie::update`].
    pub fn apply(&mut self, input: &MovieInput) -> Result<(), ShelfError> {
        self.update(input.title.clone(), input.director.clone(), input.release_year)?;
        self.series_name.clone_from(&input.series_name);
        Ok(())
    }

    #[must_use]
    pub fn key(&self) -> MovieKey {
        MovieKey::new(&self.director, &self.title)
    }

    #[must_use]
    pub fn id(&self) -> MovieId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn director(&self) -> &str {
        &self.director
    }

    #[must_use]
    pub fn release_year(&self) -> i32 {
        self.release_year
    }

    #[must_use]
    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    #[must_use]
    pub fn series_name(&self) -> Option<&str> {
        self.series_name.as_deref()
    }

    #[must_use]
    pub fn to_record(&self) -> MovieRecord {
        MovieRecord {
            movie_id: self.id,
            title: self.title.clone(),
            director: self.director.clone(),
            year: self.release_year,
            series_name: self.series_name.clone(),
            user_key: self.user_key.clone(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> MovieFields {
        MovieFields {
            title: self.title.clone(),
            director: self.director.clone(),
            year: self.release_year,
            series_name: self.series_name.clone(),
        }
    }
}

impl Display for Movie {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}), Directed by {}", self.title, self.release_year, self.director)?;
        if let Some(series_name) = &self.series_name {
            write!(f, ", part of {series_name}")?;
        }
        Ok(())
    }
}

/// Parse a release year typed into a form or prompt.
///
/// # Errors
/// Returns [`ShelfError::Validation`] when the value is blank, not a whole number,
/// or earlier than [`MIN_RELEASE_YEAR`].
pub fn parse_release_year(raw: &str) -> Result<i32, ShelfError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ShelfError::Validation("release year MUST be provided".to_string()));
    }
    let year = raw.parse::<i32>().map_err(|_| {
        ShelfError::Validation(format!("release year MUST be a whole number, got `{raw}`"))
    })?;
    check_year(year)?;
    Ok(year)
}

fn validate(title: &str, director: &str, release_year: i32) -> Result<(), ShelfError> {
    if title.trim().is_empty() {
        return Err(ShelfError::Validation("title MUST be non-empty".to_string()));
    }
    if director.trim().is_empty() {
        return Err(ShelfError::Validation("director MUST be non-empty".to_string()));
    }
    check_year(release_year)
}

fn check_year(release_year: i32) -> Result<(), ShelfError> {
    if release_year < MIN_RELEASE_YEAR {
        return Err(ShelfError::Validation(format!(
            "release year MUST be >= {MIN_RELEASE_YEAR}, got {release_year}"
        )));
    }
    Ok(())
}
