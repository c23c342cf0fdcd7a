use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use movie_shelf_core::{
    CategoryKey, CategoryRecord, MovieFields, MovieId, MovieRecord, RecordStore, StoreError,
    UserKey, ALL_MOVIES,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};
use ulid::Ulid;

/// Schema version stamped into `PRAGMA user_version` once the tables exist.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS users (
  user_key TEXT PRIMARY KEY,
  username TEXT NOT NULL,
  password_hash TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS movies (
  movie_id TEXT PRIMARY KEY,
  user_key TEXT NOT NULL,
  title TEXT NOT NULL CHECK (length(trim(title)) > 0),
  director TEXT NOT NULL CHECK (length(trim(director)) > 0),
  release_year INTEGER NOT NULL CHECK (release_year >= 1880),
  series_name TEXT,
  created_at TEXT NOT NULL,
  UNIQUE(user_key, director, title)
);

CREATE TABLE IF NOT EXISTS categories (
  user_key TEXT NOT NULL,
  name_key TEXT NOT NULL,
  name TEXT NOT NULL CHECK (length(trim(name)) > 0),
  description TEXT,
  created_at TEXT NOT NULL,
  PRIMARY KEY (user_key, name_key)
);

CREATE TABLE IF NOT EXISTS category_members (
  user_key TEXT NOT NULL,
  name_key TEXT NOT NULL,
  movie_id TEXT NOT NULL,
  position INTEGER NOT NULL,
  PRIMARY KEY (user_key, name_key, movie_id),
  FOREIGN KEY (user_key, name_key) REFERENCES categories(user_key, name_key)
    ON DELETE CASCADE ON UPDATE CASCADE,
  FOREIGN KEY (movie_id) REFERENCES movies(movie_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_movies_user_key ON movies(user_key);
CREATE INDEX IF NOT EXISTS idx_category_members_movie_id ON category_members(movie_id);
";

const SAMPLE_MOVIES: [(&str, &str, i32, &str); 3] = [
    ("Inception", "Christopher Nolan", 2010, "marc"),
    ("The Matrix", "Wachowskis", 1999, "marc"),
    ("Howl's Moving Castle", "Hayao Miyazaki", 2004, "testinguser"),
];

const ALL_SAMPLE_TITLES: &[&str] = &["Inception", "The Matrix", "Howl's Moving Castle"];

const SAMPLE_CATEGORIES: [(&str, &str, &[&str], &str); 5] = [
    (ALL_MOVIES, "genre with all movies.", ALL_SAMPLE_TITLES, "marc"),
    (ALL_MOVIES, "genre with all movies.", ALL_SAMPLE_TITLES, "alice"),
    (ALL_MOVIES, "genre with all movies.", ALL_SAMPLE_TITLES, "testinguser"),
    ("Sci-Fi", "Science fiction movies.", &["Inception", "The Matrix"], "marc"),
    ("Fantasy", "Fantasy-themed movies.", &["Howl's Moving Castle"], "marc"),
];

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub up_to_date: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: i64,
    pub parent: String,
    pub fk_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub foreign_key_violations: Vec<ForeignKeyViolation>,
    pub schema_status: SchemaStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedSummary {
    pub movies: usize,
    pub categories: usize,
    pub memberships: usize,
}

/// A registered account. `password_hash` is an encoded PHC string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    pub user_key: UserKey,
    pub username: String,
    pub password_hash: String,
}

impl SqliteStore {
    /// Open a SQLite-backed movie store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self { conn })
    }

    /// Report the schema version stamped in the database file against the one
    /// this build creates. Reads only; an empty file reports version 0.
    ///
    /// # Errors
    /// Returns an error when the version pragma cannot be read.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let current_version = stamped_schema_version(&self.conn)?;
        Ok(SchemaStatus {
            current_version,
            target_version: SCHEMA_VERSION,
            up_to_date: current_version == SCHEMA_VERSION,
        })
    }

    /// Create any missing tables and indexes and stamp the schema version.
    /// Running it against an up-to-date file changes nothing.
    ///
    /// # Errors
    /// Returns an error when the file was stamped by a newer build or the schema
    /// cannot be applied.
    pub fn migrate(&mut self) -> Result<SchemaStatus> {
        let found = stamped_schema_version(&self.conn)?;
        if found > SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {found}; this build supports {SCHEMA_VERSION}"
            ));
        }

        if found == SCHEMA_VERSION {
            return self.schema_status();
        }

        let tx = self.conn.transaction().context("failed to start schema transaction")?;
        tx.execute_batch(SCHEMA_SQL).context("failed to apply schema")?;
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)
            .context("failed to stamp schema version")?;
        tx.commit().context("failed to commit schema")?;

        info!(version = SCHEMA_VERSION, "created movie shelf schema");
        self.schema_status()
    }

    /// Register an account unless its key is taken. Returns whether it was stored.
    ///
    /// # Errors
    /// Returns an error when the write fails.
    pub fn insert_user(&mut self, user: &StoredUser) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO users(user_key, username, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.user_key.as_str(),
                    user.username,
                    user.password_hash,
                    now_rfc3339()?
                ],
            )
            .context("failed to insert user")?;
        Ok(inserted == 1)
    }

    /// # Errors
    /// Returns an error when the lookup fails.
    pub fn find_user(&self, user_key: &UserKey) -> Result<Option<StoredUser>> {
        self.conn
            .query_row(
                "SELECT username, password_hash FROM users WHERE user_key = ?1",
                params![user_key.as_str()],
                |row| {
                    Ok(StoredUser {
                        user_key: user_key.clone(),
                        username: row.get(0)?,
                        password_hash: row.get(1)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("failed to read user {user_key}"))
    }

    /// Load every movie owned by `user_key`, oldest first.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded from `SQLite`.
    pub fn load_movies(&self, user_key: &UserKey) -> Result<Vec<MovieRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT movie_id, title, director, release_year, series_name
             FROM movies
             WHERE user_key = ?1
             ORDER BY created_at ASC, movie_id ASC",
        )?;

        let mut rows = stmt.query(params![user_key.as_str()])?;
        let mut movies = Vec::new();

        while let Some(row) = rows.next()? {
            let movie_id_raw: String = row.get(0)?;
            movies.push(MovieRecord {
                movie_id: parse_movie_id(&movie_id_raw)?,
                title: row.get(1)?,
                director: row.get(2)?,
                year: row.get(3)?,
                series_name: row.get(4)?,
                user_key: user_key.clone(),
            });
        }

        Ok(movies)
    }

    /// Load every category owned by `user_key` with its members in display order.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded from `SQLite`.
    pub fn load_categories(&self, user_key: &UserKey) -> Result<Vec<CategoryRecord>> {
        let mut members: BTreeMap<String, Vec<MovieId>> = BTreeMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT name_key, movie_id
                 FROM category_members
                 WHERE user_key = ?1
                 ORDER BY name_key ASC, position ASC",
            )?;
            let mut rows = stmt.query(params![user_key.as_str()])?;
            while let Some(row) = rows.next()? {
                let name_key: String = row.get(0)?;
                let movie_id_raw: String = row.get(1)?;
                members.entry(name_key).or_default().push(parse_movie_id(&movie_id_raw)?);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT name_key, name, description
             FROM categories
             WHERE user_key = ?1
             ORDER BY created_at ASC, name_key ASC",
        )?;
        let mut rows = stmt.query(params![user_key.as_str()])?;
        let mut categories = Vec::new();

        while let Some(row) = rows.next()? {
            let name_key: String = row.get(0)?;
            categories.push(CategoryRecord {
                name: row.get(1)?,
                description: row.get(2)?,
                members: members.remove(&name_key).unwrap_or_default(),
                user_key: user_key.clone(),
            });
        }

        Ok(categories)
    }

    /// Insert a movie and file it under `filed_under` in one transaction. The
    /// category is created from the record when the user has none by that name;
    /// otherwise the movie is appended to it.
    ///
    /// # Errors
    /// Returns an error when any row violates a constraint or the write fails.
    /// Nothing is committed in that case.
    pub fn save_movie(
        &mut self,
        record: &MovieRecord,
        filed_under: &CategoryRecord,
    ) -> Result<MovieId> {
        let now = now_rfc3339()?;
        let tx = self.conn.transaction().context("failed to start transaction")?;
        insert_movie_row(&tx, record, &now)?;

        let key = CategoryKey::from_name(&filed_under.name);
        if category_exists(&tx, &record.user_key, &key)? {
            append_member(&tx, &record.user_key, &key, record.movie_id)?;
        } else {
            insert_category_rows(&tx, filed_under, &now)?;
        }
        tx.commit().context("failed to commit movie transaction")?;

        debug!(user_key = %record.user_key, movie_id = %record.movie_id, category = %key, "inserted movie");
        Ok(record.movie_id)
    }

    /// # Errors
    /// Returns an error when the write fails.
    pub fn save_movie_fields(
        &mut self,
        user_key: &UserKey,
        movie_id: MovieId,
        fields: &MovieFields,
    ) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE movies
                 SET title = ?3, director = ?4, release_year = ?5, series_name = ?6
                 WHERE user_key = ?1 AND movie_id = ?2",
                params![
                    user_key.as_str(),
                    movie_id.to_string(),
                    fields.title,
                    fields.director,
                    fields.year,
                    fields.series_name,
                ],
            )
            .with_context(|| format!("failed to update movie {movie_id}"))
    }

    /// Insert a category and the members it already carries in one transaction.
    ///
    /// # Errors
    /// Returns an error when any row violates a constraint or the write fails.
    pub fn save_category(&mut self, record: &CategoryRecord) -> Result<CategoryKey> {
        let now = now_rfc3339()?;
        let tx = self.conn.transaction().context("failed to start transaction")?;
        let key = insert_category_rows(&tx, record, &now)?;
        tx.commit().context("failed to commit category transaction")?;

        debug!(user_key = %record.user_key, category = %key, members = record.members.len(), "inserted category");
        Ok(key)
    }

    /// Delete a category; its membership rows go with it.
    ///
    /// # Errors
    /// Returns an error when the write fails.
    pub fn purge_category(&mut self, user_key: &UserKey, name: &str) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM categories WHERE user_key = ?1 AND name_key = ?2",
                params![user_key.as_str(), CategoryKey::from_name(name).as_str()],
            )
            .with_context(|| format!("failed to delete category {name}"))
    }

    /// # Errors
    /// Returns an error when the new name collides or the write fails.
    pub fn retitle_category(
        &mut self,
        user_key: &UserKey,
        name: &str,
        new_name: &str,
    ) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE categories SET name = ?3, name_key = ?4
                 WHERE user_key = ?1 AND name_key = ?2",
                params![
                    user_key.as_str(),
                    CategoryKey::from_name(name).as_str(),
                    new_name,
                    CategoryKey::from_name(new_name).as_str(),
                ],
            )
            .with_context(|| format!("failed to rename category {name} to {new_name}"))
    }

    /// Append a member after the current last position. An existing member stays
    /// put and a missing category matches nothing; both return 0.
    ///
    /// # Errors
    /// Returns an error when the movie row is missing or the write fails.
    pub fn link_member(&mut self, user_key: &UserKey, name: &str, movie_id: MovieId) -> Result<usize> {
        append_member(&self.conn, user_key, &CategoryKey::from_name(name), movie_id)
            .with_context(|| format!("failed to add movie {movie_id} to category {name}"))
    }

    /// # Errors
    /// Returns an error when the write fails.
    pub fn unlink_member(
        &mut self,
        user_key: &UserKey,
        name: &str,
        movie_id: MovieId,
    ) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM category_members
                 WHERE user_key = ?1 AND name_key = ?2 AND movie_id = ?3",
                params![user_key.as_str(), CategoryKey::from_name(name).as_str(), movie_id.to_string()],
            )
            .with_context(|| format!("failed to remove movie {movie_id} from category {name}"))
    }

    /// Replace all movies and categories with the sample collection. Accounts are
    /// left alone. Sample memberships only resolve to movies of the same user.
    ///
    /// # Errors
    /// Returns an error when any write in the transaction fails.
    pub fn seed_sample_data(&mut self) -> Result<SeedSummary> {
        let now = now_rfc3339()?;
        let tx = self.conn.transaction().context("failed to start seed transaction")?;

        tx.execute_batch(
            "DELETE FROM category_members;
             DELETE FROM categories;
             DELETE FROM movies;",
        )
        .context("failed to clear movies and categories")?;

        let mut ids: BTreeMap<(&str, &str), MovieId> = BTreeMap::new();
        for (title, director, year, user_key) in SAMPLE_MOVIES {
            let record = MovieRecord {
                movie_id: MovieId::new(),
                title: title.to_string(),
                director: director.to_string(),
                year,
                series_name: None,
                user_key: UserKey::from_username(user_key),
            };
            insert_movie_row(&tx, &record, &now)?;
            ids.insert((user_key, title), record.movie_id);
        }

        let mut memberships = 0;
        for (name, description, titles, user_key) in SAMPLE_CATEGORIES {
            let members = titles
                .iter()
                .filter_map(|title| ids.get(&(user_key, *title)).copied())
                .collect::<Vec<_>>();
            memberships += members.len();
            let record = CategoryRecord {
                name: name.to_string(),
                description: Some(description.to_string()),
                members,
                user_key: UserKey::from_username(user_key),
            };
            insert_category_rows(&tx, &record, &now)?;
        }

        tx.commit().context("failed to commit seed transaction")?;

        let summary = SeedSummary {
            movies: SAMPLE_MOVIES.len(),
            categories: SAMPLE_CATEGORIES.len(),
            memberships,
        };
        info!(movies = summary.movies, categories = summary.categories, "seeded sample data");
        Ok(summary)
    }

    /// Run quick-check, foreign-key-check, and schema status health probes.
    ///
    /// # Errors
    /// Returns an error when any integrity probe query fails.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let quick_check_message: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0))
            .context("failed to run PRAGMA quick_check")?;

        let mut stmt = self
            .conn
            .prepare("PRAGMA foreign_key_check")
            .context("failed to prepare PRAGMA foreign_key_check")?;
        let rows = stmt.query_map([], |row| {
            Ok(ForeignKeyViolation {
                table: row.get(0)?,
                rowid: row.get(1)?,
                parent: row.get(2)?,
                fk_index: row.get(3)?,
            })
        })?;

        let mut foreign_key_violations = Vec::new();
        for row in rows {
            foreign_key_violations.push(row?);
        }

        let schema_status = self.schema_status()?;
        Ok(IntegrityReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            foreign_key_violations,
            schema_status,
        })
    }
}

impl RecordStore for SqliteStore {
    fn find_movies(&self, user_key: &UserKey) -> Result<Vec<MovieRecord>, StoreError> {
        self.load_movies(user_key).map_err(into_store_error)
    }

    fn find_categories(&self, user_key: &UserKey) -> Result<Vec<CategoryRecord>, StoreError> {
        self.load_categories(user_key).map_err(into_store_error)
    }

    fn insert_movie(
        &mut self,
        record: &MovieRecord,
        filed_under: &CategoryRecord,
    ) -> Result<MovieId, StoreError> {
        self.save_movie(record, filed_under).map_err(into_store_error)
    }

    fn update_movie(
        &mut self,
        user_key: &UserKey,
        movie_id: MovieId,
        fields: &MovieFields,
    ) -> Result<usize, StoreError> {
        self.save_movie_fields(user_key, movie_id, fields).map_err(into_store_error)
    }

    fn insert_category(&mut self, record: &CategoryRecord) -> Result<CategoryKey, StoreError> {
        self.save_category(record).map_err(into_store_error)
    }

    fn delete_category(&mut self, user_key: &UserKey, name: &str) -> Result<usize, StoreError> {
        self.purge_category(user_key, name).map_err(into_store_error)
    }

    fn rename_category(
        &mut self,
        user_key: &UserKey,
        name: &str,
        new_name: &str,
    ) -> Result<usize, StoreError> {
        self.retitle_category(user_key, name, new_name).map_err(into_store_error)
    }

    fn add_member(
        &mut self,
        user_key: &UserKey,
        category_name: &str,
        movie_id: MovieId,
    ) -> Result<usize, StoreError> {
        self.link_member(user_key, category_name, movie_id).map_err(into_store_error)
    }

    fn remove_member(
        &mut self,
        user_key: &UserKey,
        category_name: &str,
        movie_id: MovieId,
    ) -> Result<usize, StoreError> {
        self.unlink_member(user_key, category_name, movie_id).map_err(into_store_error)
    }
}

fn into_store_error(err: anyhow::Error) -> StoreError {
    StoreError::new(format!("{err:#}"))
}

fn insert_movie_row(conn: &Connection, record: &MovieRecord, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO movies(
            movie_id, user_key, title, director, release_year, series_name, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.movie_id.to_string(),
            record.user_key.as_str(),
            record.title,
            record.director,
            record.year,
            record.series_name,
            now,
        ],
    )
    .with_context(|| format!("failed to insert movie {}: {}", record.director, record.title))?;
    Ok(())
}

fn insert_category_rows(conn: &Connection, record: &CategoryRecord, now: &str) -> Result<CategoryKey> {
    let key = CategoryKey::from_name(&record.name);
    conn.execute(
        "INSERT INTO categories(user_key, name_key, name, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![record.user_key.as_str(), key.as_str(), record.name, record.description, now],
    )
    .with_context(|| format!("failed to insert category {}", record.name))?;

    for (position, movie_id) in record.members.iter().enumerate() {
        let position = i64::try_from(position).context("category member position overflow")?;
        conn.execute(
            "INSERT INTO category_members(user_key, name_key, movie_id, position)
             VALUES (?1, ?2, ?3, ?4)",
            params![record.user_key.as_str(), key.as_str(), movie_id.to_string(), position],
        )
        .with_context(|| format!("failed to insert member {movie_id} of category {}", record.name))?;
    }

    Ok(key)
}

fn category_exists(conn: &Connection, user_key: &UserKey, key: &CategoryKey) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE user_key = ?1 AND name_key = ?2)",
        params![user_key.as_str(), key.as_str()],
        |row| row.get::<_, bool>(0),
    )
    .with_context(|| format!("failed to look up category {key}"))
}

fn append_member(
    conn: &Connection,
    user_key: &UserKey,
    key: &CategoryKey,
    movie_id: MovieId,
) -> Result<usize> {
    let appended = conn.execute(
        "INSERT OR IGNORE INTO category_members(user_key, name_key, movie_id, position)
         SELECT c.user_key, c.name_key, ?3, (
             SELECT COALESCE(MAX(m.position), -1) + 1
             FROM category_members m
             WHERE m.user_key = c.user_key AND m.name_key = c.name_key
         )
         FROM categories c
         WHERE c.user_key = ?1 AND c.name_key = ?2",
        params![user_key.as_str(), key.as_str(), movie_id.to_string()],
    )?;
    Ok(appended)
}

fn stamped_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .context("failed to read schema version")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_movie_id(raw: &str) -> Result<MovieId> {
    let parsed = Ulid::from_string(raw).with_context(|| format!("invalid ULID: {raw}"))?;
    Ok(MovieId(parsed))
}
