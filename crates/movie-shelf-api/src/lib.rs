use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use movie_shelf_core::{
    Category, Movie, MovieId, MovieInput, SessionContext, Shelf, ShelfError, UserKey,
};
use movie_shelf_store_sqlite::{
    IntegrityReport, SchemaStatus, SeedSummary, SqliteStore, StoredUser,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

mod auth;
mod config;
mod session;

pub use config::{
    default_config_path, DatabaseConfig, LogConfig, ServiceConfig, ShelfConfig, BIND_ENV_VAR,
    DB_ENV_VAR, DEFAULT_BIND, DEFAULT_DB_PATH, DEFAULT_LOG_FILTER,
};
pub use session::{Session, SessionError, SessionToken, SESSION_IDLE_TIMEOUT};

use session::SessionRegistry;

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterResult {
    pub username: String,
    pub user_key: UserKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateMovieRequest {
    pub key: String,
    #[serde(flatten)]
    pub movie: MovieInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameCategoryRequest {
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipRequest {
    pub category: String,
    pub movie_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CombineRequest {
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieView {
    pub key: String,
    pub movie_id: MovieId,
    pub title: String,
    pub director: String,
    pub release_year: i32,
    pub series_name: Option<String>,
    pub display: String,
}

impl From<&Movie> for MovieView {
    fn from(movie: &Movie) -> Self {
        Self {
            key: movie.key().as_str().to_string(),
            movie_id: movie.id(),
            title: movie.title().to_string(),
            director: movie.director().to_string(),
            release_year: movie.release_year(),
            series_name: movie.series_name().map(str::to_string),
            display: movie.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategorySummary {
    pub name: String,
    pub description: Option<String>,
    pub movie_count: usize,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name().to_string(),
            description: category.description().map(str::to_string),
            movie_count: category.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryView {
    pub name: String,
    pub description: Option<String>,
    pub movies: Vec<MovieView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipResult {
    pub category: String,
    pub movie_key: String,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshResult {
    pub movies: usize,
    pub categories: usize,
}

/// Entry point shared by the CLI and the HTTP service.
///
/// Holds the arena of loaded shelves, one per user, and the live sessions. Each
/// shelf sits behind its own lock so operations for one user are serialized while
/// different users proceed independently.
#[derive(Debug, Clone)]
pub struct ShelfApi {
    inner: Arc<ApiInner>,
}

#[derive(Debug)]
struct ApiInner {
    db_path: PathBuf,
    shelves: Mutex<HashMap<UserKey, Arc<Mutex<Shelf>>>>,
    sessions: Mutex<SessionRegistry>,
}

impl ShelfApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self::with_idle_timeout(db_path, SESSION_IDLE_TIMEOUT)
    }

    /// Like [`ShelfApi::new`], with sessions expiring after `idle_timeout` without use.
    #[must_use]
    pub fn with_idle_timeout(db_path: PathBuf, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ApiInner {
                db_path,
                shelves: Mutex::new(HashMap::new()),
                sessions: Mutex::new(SessionRegistry::with_idle_timeout(idle_timeout)),
            }),
        }
    }

    #[must_use]
    pub fn db_path(&self) -> &std::path::Path {
        &self.inner.db_path
    }

    fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.inner.db_path)
    }

    fn open_migrated_store(&self) -> Result<SqliteStore> {
        let mut store = self.open_store()?;
        store.migrate()?;
        Ok(store)
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = self.open_store()?;
        store.schema_status()
    }

    /// Create any missing tables and report the resulting schema status.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or the schema applied.
    pub fn migrate(&self) -> Result<SchemaStatus> {
        let mut store = self.open_store()?;
        store.migrate()
    }

    /// Replace all movies and categories with the sample collection and forget
    /// every loaded shelf.
    ///
    /// # Errors
    /// Returns an error when the database cannot be migrated or written.
    pub fn seed_sample_data(&self) -> Result<SeedSummary> {
        let mut store = self.open_migrated_store()?;
        let summary = store.seed_sample_data()?;
        self.inner.shelves.lock().clear();
        Ok(summary)
    }

    /// # Errors
    /// Returns an error when any integrity probe fails to run.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let store = self.open_store()?;
        store.integrity_check()
    }

    /// Create an account and its "All Movies" category.
    ///
    /// # Errors
    /// Returns [`ShelfError::Validation`] for blank fields,
    /// [`SessionError::UserExists`] when the username is taken (ignoring case), or
    /// an error when hashing or persistence fails.
    pub fn register(&self, credentials: &Credentials) -> Result<RegisterResult> {
        let username = credentials.username.trim();
        if username.is_empty() {
            return Err(ShelfError::Validation("username MUST be non-empty".to_string()).into());
        }
        if credentials.password.is_empty() {
            return Err(ShelfError::Validation("password MUST be non-empty".to_string()).into());
        }

        let user_key = UserKey::from_username(username);
        let mut store = self.open_migrated_store()?;
        if store.find_user(&user_key)?.is_some() {
            return Err(SessionError::UserExists(username.to_string()).into());
        }

        let stored = store.insert_user(&StoredUser {
            user_key: user_key.clone(),
            username: username.to_string(),
            password_hash: auth::hash_password(&credentials.password)?,
        })?;
        if !stored {
            return Err(SessionError::UserExists(username.to_string()).into());
        }

        let mut shelf = Shelf::load(&store, user_key.clone())?;
        shelf.ensure_all_movies(&mut store)?;

        info!(user_key = %user_key, "registered user");
        Ok(RegisterResult { username: username.to_string(), user_key })
    }

    /// Verify credentials, load the user's shelf, and open a session.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidCredentials`] for an unknown user or wrong
    /// password, or an error when the store cannot be read.
    pub fn login(&self, credentials: &Credentials) -> Result<Session> {
        let user_key = UserKey::from_username(&credentials.username);
        let mut store = self.open_migrated_store()?;

        let Some(user) = store.find_user(&user_key)? else {
            warn!(user_key = %user_key, "login for unknown user");
            return Err(SessionError::InvalidCredentials.into());
        };
        if !auth::verify_password(&credentials.password, &user.password_hash)? {
            warn!(user_key = %user_key, "login with wrong password");
            return Err(SessionError::InvalidCredentials.into());
        }

        self.shelf_handle(&mut store, &user_key)?;
        let session = Session::new(user_key, user.username);
        let now = Instant::now();
        let mut sessions = self.inner.sessions.lock();
        self.expire_idle_sessions(&mut sessions, now);
        sessions.insert(session.clone(), now);
        drop(sessions);

        info!(user_key = %session.user_key, "user logged in");
        Ok(session)
    }

    /// End a session. The user's shelf leaves the arena once no session refers
    /// to it. Returns whether the token was live.
    pub fn logout(&self, token: &SessionToken) -> bool {
        let mut sessions = self.inner.sessions.lock();
        let Some(session) = sessions.remove(token) else {
            return false;
        };

        if !sessions.has_user(&session.user_key) {
            self.inner.shelves.lock().remove(&session.user_key);
            debug!(user_key = %session.user_key, "dropped shelf after last logout");
        }
        info!(user_key = %session.user_key, "user logged out");
        true
    }

    /// The user a live token belongs to. `None` is an unauthenticated context.
    /// Resolving keeps the session alive; idle sessions are expired first.
    #[must_use]
    pub fn resolve(&self, token: &SessionToken) -> Option<UserKey> {
        let now = Instant::now();
        let mut sessions = self.inner.sessions.lock();
        self.expire_idle_sessions(&mut sessions, now);
        sessions.user_key(token, now)
    }

    fn expire_idle_sessions(&self, sessions: &mut SessionRegistry, now: Instant) {
        let orphaned = sessions.expire_idle(now);
        if orphaned.is_empty() {
            return;
        }

        let mut shelves = self.inner.shelves.lock();
        for user_key in &orphaned {
            shelves.remove(user_key);
            debug!(user_key = %user_key, "dropped shelf after its sessions went idle");
        }
        info!(users = orphaned.len(), "expired idle sessions");
    }

    /// # Errors
    /// Returns [`SessionError::NotAuthenticated`] without a user, or an error when
    /// the shelf cannot be loaded.
    pub fn movies(&self, ctx: &impl SessionContext) -> Result<Vec<MovieView>> {
        self.with_shelf(ctx, |shelf, _| Ok(shelf.movies().map(MovieView::from).collect()))
    }

    /// # Errors
    /// Returns [`ShelfError::NotFound`] for an unknown key, plus the errors of
    /// [`ShelfApi::movies`].
    pub fn movie(&self, ctx: &impl SessionContext, key: &str) -> Result<MovieView> {
        self.with_shelf(ctx, |shelf, _| {
            shelf
                .movie(key)
                .map(MovieView::from)
                .ok_or_else(|| ShelfError::NotFound(format!("movie `{key}`")))
        })
    }

    /// # Errors
    /// Returns the [`ShelfError`] of [`Shelf::add_movie`] or a session error.
    pub fn add_movie(&self, ctx: &impl SessionContext, input: &MovieInput) -> Result<MovieView> {
        self.with_shelf(ctx, |shelf, store| shelf.add_movie(store, input).map(MovieView::from))
    }

    /// # Errors
    /// Returns the [`ShelfError`] of [`Shelf::update_movie`] or a session error.
    pub fn update_movie(
        &self,
        ctx: &impl SessionContext,
        request: &UpdateMovieRequest,
    ) -> Result<MovieView> {
        self.with_shelf(ctx, |shelf, store| {
            shelf.update_movie(store, &request.key, &request.movie).map(MovieView::from)
        })
    }

    /// # Errors
    /// Returns a session error or an error when the shelf cannot be loaded.
    pub fn categories(&self, ctx: &impl SessionContext) -> Result<Vec<CategorySummary>> {
        self.with_shelf(ctx, |shelf, _| Ok(shelf.categories().map(CategorySummary::from).collect()))
    }

    /// # Errors
    /// Returns [`ShelfError::NotFound`] for an unknown category or a session error.
    pub fn category(&self, ctx: &impl SessionContext, name: &str) -> Result<CategoryView> {
        self.with_shelf(ctx, |shelf, _| category_view(shelf, name))
    }

    /// # Errors
    /// Returns the [`ShelfError`] of [`Shelf::create_category`] or a session error.
    pub fn create_category(&self, ctx: &impl SessionContext, name: &str) -> Result<CategorySummary> {
        self.with_shelf(ctx, |shelf, store| {
            shelf.create_category(store, name).map(CategorySummary::from)
        })
    }

    /// # Errors
    /// Returns the [`ShelfError`] of [`Shelf::delete_category`] or a session error.
    pub fn delete_category(&self, ctx: &impl SessionContext, name: &str) -> Result<CategorySummary> {
        self.with_shelf(ctx, |shelf, store| {
            shelf.delete_category(store, name).map(|removed| CategorySummary::from(&removed))
        })
    }

    /// # Errors
    /// Returns the [`ShelfError`] of [`Shelf::rename_category`] or a session error.
    pub fn rename_category(
        &self,
        ctx: &impl SessionContext,
        request: &RenameCategoryRequest,
    ) -> Result<CategorySummary> {
        self.with_shelf(ctx, |shelf, store| {
            shelf
                .rename_category(store, &request.name, &request.new_name)
                .map(CategorySummary::from)
        })
    }

    /// # Errors
    /// Returns the [`ShelfError`] of [`Shelf::add_to_category`] or a session error.
    pub fn add_to_category(
        &self,
        ctx: &impl SessionContext,
        request: &MembershipRequest,
    ) -> Result<MembershipResult> {
        self.with_shelf(ctx, |shelf, store| {
            let changed = shelf.add_to_category(store, &request.category, &request.movie_key)?;
            Ok(membership_result(request, changed))
        })
    }

    /// # Errors
    /// Returns the [`ShelfError`] of [`Shelf::remove_from_category`] or a session
    /// error.
    pub fn remove_from_category(
        &self,
        ctx: &impl SessionContext,
        request: &MembershipRequest,
    ) -> Result<MembershipResult> {
        self.with_shelf(ctx, |shelf, store| {
            let changed =
                shelf.remove_from_category(store, &request.category, &request.movie_key)?;
            Ok(membership_result(request, changed))
        })
    }

    /// # Errors
    /// Returns the [`ShelfError`] of [`Shelf::combine_categories`] or a session
    /// error.
    pub fn combine_categories(
        &self,
        ctx: &impl SessionContext,
        request: &CombineRequest,
    ) -> Result<CategoryView> {
        self.with_shelf(ctx, |shelf, store| {
            let name =
                shelf.combine_categories(store, &request.first, &request.second)?.name().to_string();
            category_view(shelf, &name)
        })
    }

    /// Reload the user's shelf from the database.
    ///
    /// # Errors
    /// Returns a session error or an error when the store cannot be read.
    pub fn refresh(&self, ctx: &impl SessionContext) -> Result<RefreshResult> {
        self.with_shelf(ctx, |shelf, store| {
            shelf.refresh(store)?;
            Ok(RefreshResult {
                movies: shelf.movies().count(),
                categories: shelf.categories().count(),
            })
        })
    }

    fn with_shelf<T>(
        &self,
        ctx: &impl SessionContext,
        op: impl FnOnce(&mut Shelf, &mut SqliteStore) -> Result<T, ShelfError>,
    ) -> Result<T> {
        let user_key = ctx.current_user_key().ok_or(SessionError::NotAuthenticated)?;
        let mut store = self.open_migrated_store()?;
        let handle = self.shelf_handle(&mut store, &user_key)?;
        let mut shelf = handle.lock();
        Ok(op(&mut *shelf, &mut store)?)
    }

    fn shelf_handle(&self, store: &mut SqliteStore, user_key: &UserKey) -> Result<Arc<Mutex<Shelf>>> {
        let mut shelves = self.inner.shelves.lock();
        if let Some(handle) = shelves.get(user_key) {
            return Ok(Arc::clone(handle));
        }

        let mut shelf = Shelf::load(store, user_key.clone())?;
        if shelf.ensure_all_movies(store)? {
            debug!(user_key = %user_key, "created missing All Movies category");
        }
        debug!(
            user_key = %user_key,
            movies = shelf.movies().count(),
            categories = shelf.categories().count(),
            "loaded shelf"
        );

        let handle = Arc::new(Mutex::new(shelf));
        shelves.insert(user_key.clone(), Arc::clone(&handle));
        Ok(handle)
    }
}

fn category_view(shelf: &Shelf, name: &str) -> Result<CategoryView, ShelfError> {
    let category =
        shelf.category(name).ok_or_else(|| ShelfError::NotFound(format!("category `{name}`")))?;
    Ok(CategoryView {
        name: category.name().to_string(),
        description: category.description().map(str::to_string),
        movies: shelf.category_movies(name)?.into_iter().map(MovieView::from).collect(),
    })
}

fn membership_result(request: &MembershipRequest, changed: bool) -> MembershipResult {
    MembershipResult {
        category: request.category.clone(),
        movie_key: request.movie_key.clone(),
        changed,
    }
}

#[cfg(test)]
mod tests {
    use movie_shelf_core::ALL_MOVIES;

    use super::*;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("movie-shelf-api-{}.sqlite3", ulid::Ulid::new()))
    }

    fn credentials(username: &str, password: &str) -> Credentials {
        Credentials { username: username.to_string(), password: password.to_string() }
    }

    fn cleanup(db_path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", db_path.display()));
        }
    }

    fn session_error(err: &anyhow::Error) -> Option<&SessionError> {
        err.downcast_ref::<SessionError>()
    }

    fn shelf_error(err: &anyhow::Error) -> Option<&ShelfError> {
        err.downcast_ref::<ShelfError>()
    }

    #[test]
    fn api_register_login_and_file_movies() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = ShelfApi::new(db_path.clone());

        let registered = api.register(&credentials("Marc", "popcorn"))?;
        assert_eq!(registered.user_key.as_str(), "marc");
        let session = api.login(&credentials("marc", "popcorn"))?;

        let inception =
            api.add_movie(&session, &MovieInput::new("Inception", "Christopher Nolan", 2010))?;
        api.create_category(&session, "Sci-Fi")?;
        let added = api.add_to_category(
            &session,
            &MembershipRequest { category: "sci-fi".to_string(), movie_key: inception.key.clone() },
        )?;
        assert!(added.changed);

        let sci_fi = api.category(&session, "Sci-Fi")?;
        assert_eq!(sci_fi.movies, vec![inception.clone()]);
        let all = api.category(&session, ALL_MOVIES)?;
        assert_eq!(all.movies, vec![inception]);

        let summaries = api.categories(&session)?;
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|summary| summary.movie_count == 1));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_rejects_bad_credentials_and_duplicate_users() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = ShelfApi::new(db_path.clone());
        api.register(&credentials("alice", "secret"))?;

        let Err(duplicate) = api.register(&credentials("ALICE", "other")) else {
            panic!("duplicate registration should fail");
        };
        assert!(matches!(session_error(&duplicate), Some(SessionError::UserExists(_))));

        for attempt in [credentials("alice", "wrong"), credentials("nobody", "secret")] {
            let Err(err) = api.login(&attempt) else {
                panic!("login for {} should fail", attempt.username);
            };
            assert_eq!(session_error(&err), Some(&SessionError::InvalidCredentials));
        }

        let Err(blank) = api.register(&credentials("  ", "secret")) else {
            panic!("blank username should fail");
        };
        assert!(matches!(shelf_error(&blank), Some(ShelfError::Validation(_))));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_requires_an_authenticated_context() {
        let api = ShelfApi::new(unique_temp_db_path());
        let anonymous: Option<UserKey> = None;

        let Err(err) = api.movies(&anonymous) else {
            panic!("anonymous listing should fail");
        };
        assert_eq!(session_error(&err), Some(&SessionError::NotAuthenticated));
        assert_eq!(api.resolve(&SessionToken::new()), None);
    }

    #[test]
    fn api_logout_drops_shelf_after_last_session() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = ShelfApi::new(db_path.clone());
        api.register(&credentials("marc", "popcorn"))?;
        let first = api.login(&credentials("marc", "popcorn"))?;
        let second = api.login(&credentials("Marc", "popcorn"))?;

        assert_eq!(api.resolve(&first.token), Some(UserKey::from_username("marc")));
        assert!(api.logout(&first.token));
        assert!(!api.logout(&first.token));
        assert!(api.inner.shelves.lock().contains_key(&second.user_key));
        assert!(api.logout(&second.token));
        assert!(api.inner.shelves.lock().is_empty());
        assert_eq!(api.resolve(&second.token), None);

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_idle_sessions_expire_and_release_their_shelf() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = ShelfApi::with_idle_timeout(db_path.clone(), Duration::ZERO);
        api.register(&credentials("marc", "popcorn"))?;
        let session = api.login(&credentials("marc", "popcorn"))?;
        assert!(api.inner.shelves.lock().contains_key(&session.user_key));

        assert_eq!(api.resolve(&session.token), None);
        assert!(api.inner.shelves.lock().is_empty());
        assert!(!api.logout(&session.token));

        let lasting = ShelfApi::new(db_path.clone());
        let session = lasting.login(&credentials("marc", "popcorn"))?;
        assert_eq!(lasting.resolve(&session.token), Some(session.user_key.clone()));
        assert_eq!(lasting.resolve(&session.token), Some(session.user_key));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_update_movie_keeps_memberships_under_new_key() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = ShelfApi::new(db_path.clone());
        api.register(&credentials("marc", "popcorn"))?;
        let session = api.login(&credentials("marc", "popcorn"))?;
        let matrix = api.add_movie(&session, &MovieInput::new("The Matrix", "Wachowskis", 1999))?;

        let updated = api.update_movie(
            &session,
            &UpdateMovieRequest {
                key: matrix.key,
                movie: MovieInput::new("The Matrix Reloaded", "Wachowskis", 2003)
                    .with_series_name("The Matrix"),
            },
        )?;

        assert_eq!(updated.key, "Wachowskis: The Matrix Reloaded");
        assert_eq!(updated.movie_id, matrix.movie_id);
        let all = api.category(&session, ALL_MOVIES)?;
        assert_eq!(all.movies, vec![updated.clone()]);
        assert_eq!(api.refresh(&session)?, RefreshResult { movies: 1, categories: 1 });
        assert_eq!(api.movie(&session, &updated.key)?, updated);

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_errors_carry_their_kind() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = ShelfApi::new(db_path.clone());
        api.register(&credentials("marc", "popcorn"))?;
        let session = api.login(&credentials("marc", "popcorn"))?;
        api.create_category(&session, "Sci-Fi")?;

        let Err(conflict) = api.create_category(&session, "SCI-FI") else {
            panic!("duplicate category should fail");
        };
        assert!(matches!(shelf_error(&conflict), Some(ShelfError::Conflict(_))));

        let Err(missing) = api.category(&session, "Drama") else {
            panic!("missing category should fail");
        };
        assert!(matches!(shelf_error(&missing), Some(ShelfError::NotFound(_))));

        let Err(invalid) = api.add_movie(&session, &MovieInput::new("Old", "Someone", 1700)) else {
            panic!("pre-cinema movie should fail");
        };
        assert!(matches!(shelf_error(&invalid), Some(ShelfError::Validation(_))));

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_seed_replaces_loaded_shelves() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = ShelfApi::new(db_path.clone());
        api.register(&credentials("marc", "popcorn"))?;
        let session = api.login(&credentials("marc", "popcorn"))?;
        api.add_movie(&session, &MovieInput::new("Alien", "Ridley Scott", 1979))?;

        let summary = api.seed_sample_data()?;
        assert_eq!(summary.movies, 3);

        let titles = api.movies(&session)?.into_iter().map(|movie| movie.title).collect::<Vec<_>>();
        assert_eq!(titles, vec!["Inception", "The Matrix"]);
        let combined = api.combine_categories(
            &session,
            &CombineRequest { first: "Sci-Fi".to_string(), second: "Fantasy".to_string() },
        )?;
        assert_eq!(combined.name, "Sci-Fi/Fantasy");
        assert_eq!(combined.movies.len(), 2);

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_migrate_creates_schema_once() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = ShelfApi::new(db_path.clone());

        assert!(!api.schema_status()?.up_to_date);
        let applied = api.migrate()?;
        assert!(applied.up_to_date);
        assert_eq!(api.migrate()?, applied);
        assert_eq!(api.schema_status()?, applied);
        assert!(api.integrity_check()?.quick_check_ok);

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn update_request_flattens_movie_fields() -> Result<()> {
        let request: UpdateMovieRequest = serde_json::from_value(serde_json::json!({
            "key": "Wachowskis: The Matrix",
            "title": "The Matrix",
            "director": "Wachowskis",
            "release_year": 1999
        }))?;

        assert_eq!(request.movie, MovieInput::new("The Matrix", "Wachowskis", 1999));
        Ok(())
    }
}
