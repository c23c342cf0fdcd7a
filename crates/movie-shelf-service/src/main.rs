use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use movie_shelf_api::{
    CategoryRequest, CategorySummary, CategoryView, CombineRequest, Credentials,
    MembershipRequest, MembershipResult, MovieView, RefreshResult, RegisterResult,
    RenameCategoryRequest, Session, SessionError, SessionToken, ShelfApi, ShelfConfig,
    UpdateMovieRequest, API_CONTRACT_VERSION,
};
use movie_shelf_core::{MovieInput, ShelfError, UserKey};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";

#[derive(Debug, Clone)]
struct ServiceState {
    api: ShelfApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    #[serde(skip)]
    status: StatusCode,
    service_contract_version: &'static str,
    error: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct LogoutResponse {
    logged_out: bool,
}

#[derive(Debug, Parser)]
#[command(name = "movie-shelf-service")]
#[command(about = "Local HTTP service for Movie Shelf")]
struct Args {
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long)]
    bind: Option<SocketAddr>,
    #[arg(long)]
    config: Option<PathBuf>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl ServiceError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, service_contract_version: SERVICE_CONTRACT_VERSION, error: message.into() }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, SessionError::NotAuthenticated.to_string())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        let status = status_for(&err);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %format!("{err:#}"), "request failed");
        }
        Self::new(status, format!("{err:#}"))
    }
}

fn status_for(err: &anyhow::Error) -> StatusCode {
    if let Some(shelf_error) = err.downcast_ref::<ShelfError>() {
        return match shelf_error {
            ShelfError::Validation(_) => StatusCode::BAD_REQUEST,
            ShelfError::NotFound(_) => StatusCode::NOT_FOUND,
            ShelfError::Conflict(_) => StatusCode::CONFLICT,
            ShelfError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
    }
    if let Some(session_error) = err.downcast_ref::<SessionError>() {
        return match session_error {
            SessionError::NotAuthenticated | SessionError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            SessionError::UserExists(_) => StatusCode::CONFLICT,
        };
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

type ServiceResult<T> = Result<Json<ServiceEnvelope<T>>, ServiceError>;

/// Parse `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<SessionToken, ServiceError> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| token.trim().parse::<SessionToken>().ok())
        .ok_or_else(ServiceError::unauthorized)
}

/// User behind the request's bearer token. An unknown token yields an
/// unauthenticated context, which the API rejects.
fn request_user(state: &ServiceState, headers: &HeaderMap) -> Result<Option<UserKey>, ServiceError> {
    let token = bearer_token(headers)?;
    Ok(state.api.resolve(&token))
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/db/schema-version", post(db_schema_version))
        .route("/v1/db/migrate", post(db_migrate))
        .route("/v1/users/register", post(users_register))
        .route("/v1/login", post(login))
        .route("/v1/logout", post(logout))
        .route("/v1/movies", get(movies_list))
        .route("/v1/movies/add", post(movies_add))
        .route("/v1/movies/update", post(movies_update))
        .route("/v1/categories", get(categories_list))
        .route("/v1/categories/:name", get(categories_show))
        .route("/v1/categories/create", post(categories_create))
        .route("/v1/categories/delete", post(categories_delete))
        .route("/v1/categories/rename", post(categories_rename))
        .route("/v1/categories/add-movie", post(categories_add_movie))
        .route("/v1/categories/remove-movie", post(categories_remove_movie))
        .route("/v1/categories/combine", post(categories_combine))
        .route("/v1/refresh", post(refresh))
        .with_state(state)
}

fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .with_context(|| format!("invalid log filter `{default_filter}`"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ShelfConfig::load(args.config.as_deref())?;
    init_tracing(config.log_filter())?;

    let db_path = config.resolve_db_path(args.db);
    let bind = config.resolve_bind(args.bind)?;
    let state = ServiceState {
        api: ShelfApi::with_idle_timeout(db_path.clone(), config.session_idle_timeout()),
    };

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%bind, db = %db_path.display(), "movie shelf service listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn db_schema_version(
    State(state): State<ServiceState>,
) -> ServiceResult<movie_shelf_store_sqlite::SchemaStatus> {
    let status = state.api.schema_status()?;
    Ok(Json(envelope(status)))
}

async fn db_migrate(
    State(state): State<ServiceState>,
) -> ServiceResult<movie_shelf_store_sqlite::SchemaStatus> {
    let status = state.api.migrate()?;
    Ok(Json(envelope(status)))
}

async fn users_register(
    State(state): State<ServiceState>,
    Json(credentials): Json<Credentials>,
) -> ServiceResult<RegisterResult> {
    Ok(Json(envelope(state.api.register(&credentials)?)))
}

async fn login(
    State(state): State<ServiceState>,
    Json(credentials): Json<Credentials>,
) -> ServiceResult<Session> {
    Ok(Json(envelope(state.api.login(&credentials)?)))
}

async fn logout(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> ServiceResult<LogoutResponse> {
    let token = bearer_token(&headers)?;
    Ok(Json(envelope(LogoutResponse { logged_out: state.api.logout(&token) })))
}

async fn movies_list(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> ServiceResult<Vec<MovieView>> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.movies(&user)?)))
}

async fn movies_add(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(input): Json<MovieInput>,
) -> ServiceResult<MovieView> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.add_movie(&user, &input)?)))
}

async fn movies_update(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<UpdateMovieRequest>,
) -> ServiceResult<MovieView> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.update_movie(&user, &request)?)))
}

async fn categories_list(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> ServiceResult<Vec<CategorySummary>> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.categories(&user)?)))
}

async fn categories_show(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ServiceResult<CategoryView> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.category(&user, &name)?)))
}

async fn categories_create(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<CategoryRequest>,
) -> ServiceResult<CategorySummary> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.create_category(&user, &request.name)?)))
}

async fn categories_delete(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<CategoryRequest>,
) -> ServiceResult<CategorySummary> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.delete_category(&user, &request.name)?)))
}

async fn categories_rename(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<RenameCategoryRequest>,
) -> ServiceResult<CategorySummary> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.rename_category(&user, &request)?)))
}

async fn categories_add_movie(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<MembershipRequest>,
) -> ServiceResult<MembershipResult> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.add_to_category(&user, &request)?)))
}

async fn categories_remove_movie(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<MembershipRequest>,
) -> ServiceResult<MembershipResult> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.remove_from_category(&user, &request)?)))
}

async fn categories_combine(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<CombineRequest>,
) -> ServiceResult<CategoryView> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.combine_categories(&user, &request)?)))
}

async fn refresh(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> ServiceResult<RefreshResult> {
    let user = request_user(&state, &headers)?;
    Ok(Json(envelope(state.api.refresh(&user)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("movie-shelf-service-{}.sqlite3", ulid::Ulid::new()))
    }

    async fn response_json(response: Response) -> Value {
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri).method(method);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(axum::body::Body::from(body.to_string())),
            None => builder.body(axum::body::Body::empty()),
        }
        .unwrap_or_else(|err| panic!("failed to build request {method} {uri}: {err}"));

        let response = match router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request {method} {uri} failed: {err}"),
        };
        let status = response.status();
        (status, response_json(response).await)
    }

    async fn logged_in_router(db_path: PathBuf) -> (Router, String) {
        let router = app(ServiceState { api: ShelfApi::new(db_path) });
        let credentials = json!({"username": "marc", "password": "popcorn"});

        let (status, _) =
            send(&router, "POST", "/v1/users/register", None, Some(credentials.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, login) = send(&router, "POST", "/v1/login", None, Some(credentials)).await;
        assert_eq!(status, StatusCode::OK);

        let token = login
            .get("data")
            .and_then(|data| data.get("token"))
            .and_then(Value::as_str)
            .unwrap_or_else(|| panic!("missing data.token in response: {login}"))
            .to_string();
        (router, token)
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let router = app(ServiceState { api: ShelfApi::new(unique_temp_db_path()) });

        let (status, value) = send(&router, "GET", "/v1/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            value.get("service_contract_version").and_then(Value::as_str),
            Some(SERVICE_CONTRACT_VERSION)
        );
        assert_eq!(value["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn service_add_file_and_show_flow_round_trip() {
        let db_path = unique_temp_db_path();
        let (router, token) = logged_in_router(db_path.clone()).await;

        let (status, added) = send(
            &router,
            "POST",
            "/v1/movies/add",
            Some(&token),
            Some(json!({"title": "Inception", "director": "Christopher Nolan", "release_year": 2010})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(added["api_contract_version"], API_CONTRACT_VERSION);
        assert_eq!(added["data"]["key"], "Christopher Nolan: Inception");

        let (status, _) = send(
            &router,
            "POST",
            "/v1/categories/create",
            Some(&token),
            Some(json!({"name": "Sci-Fi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, filed) = send(
            &router,
            "POST",
            "/v1/categories/add-movie",
            Some(&token),
            Some(json!({"category": "Sci-Fi", "movie_key": "Christopher Nolan: Inception"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(filed["data"]["changed"], true);

        let (status, sci_fi) =
            send(&router, "GET", "/v1/categories/Sci-Fi", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sci_fi["data"]["movies"][0]["title"], "Inception");

        let (status, all) =
            send(&router, "GET", "/v1/categories/All%20Movies", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all["data"]["movies"].as_array().map(Vec::len), Some(1));

        let (status, refreshed) = send(&router, "POST", "/v1/refresh", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refreshed["data"]["movies"], 1);
        assert_eq!(refreshed["data"]["categories"], 2);

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn requests_without_valid_token_are_unauthorized() {
        let db_path = unique_temp_db_path();
        let (router, token) = logged_in_router(db_path.clone()).await;

        let (status, value) = send(&router, "GET", "/v1/movies", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(value["service_contract_version"], SERVICE_CONTRACT_VERSION);

        let stranger = SessionToken::new().to_string();
        let (status, _) = send(&router, "GET", "/v1/movies", Some(&stranger), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, logout) = send(&router, "POST", "/v1/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logout["data"]["logged_out"], true);
        let (status, _) = send(&router, "GET", "/v1/movies", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &router,
            "POST",
            "/v1/login",
            None,
            Some(json!({"username": "marc", "password": "butter"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn shelf_errors_map_to_status_codes() {
        let db_path = unique_temp_db_path();
        let (router, token) = logged_in_router(db_path.clone()).await;

        let (status, value) = send(
            &router,
            "POST",
            "/v1/movies/add",
            Some(&token),
            Some(json!({"title": "Roundhay", "director": "Le Prince", "release_year": 1878})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(value["error"].as_str().is_some_and(|error| error.contains(">= 1880")));

        let (status, _) =
            send(&router, "GET", "/v1/categories/Westerns", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &router,
            "POST",
            "/v1/categories/delete",
            Some(&token),
            Some(json!({"name": "All Movies"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &router,
            "POST",
            "/v1/users/register",
            None,
            Some(json!({"username": "MARC", "password": "other"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn combine_and_rename_through_the_router() {
        let db_path = unique_temp_db_path();
        let (router, token) = logged_in_router(db_path.clone()).await;

        for name in ["Drama", "Comedy"] {
            let (status, _) = send(
                &router,
                "POST",
                "/v1/categories/create",
                Some(&token),
                Some(json!({"name": name})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, combined) = send(
            &router,
            "POST",
            "/v1/categories/combine",
            Some(&token),
            Some(json!({"first": "Drama", "second": "Comedy"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(combined["data"]["name"], "Drama/Comedy");

        let (status, renamed) = send(
            &router,
            "POST",
            "/v1/categories/rename",
            Some(&token),
            Some(json!({"name": "Drama/Comedy", "new_name": "Dramedy"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["data"]["name"], "Dramedy");

        let (status, listed) = send(&router, "GET", "/v1/categories", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let names = listed["data"]
            .as_array()
            .unwrap_or_else(|| panic!("categories should be an array: {listed}"))
            .iter()
            .filter_map(|category| category["name"].as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["All Movies", "Comedy", "Drama", "Dramedy"]);

        let _ = std::fs::remove_file(&db_path);
    }

    async fn post_ok(router: &Router, uri: &str, token: &str, body: Value) -> Value {
        let (status, value) = send(router, "POST", uri, Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::OK, "POST {uri} failed: {value}");
        value
    }

    #[tokio::test]
    async fn update_movie_through_the_router_keeps_memberships() {
        let db_path = unique_temp_db_path();
        let (router, token) = logged_in_router(db_path.clone()).await;
        post_ok(
            &router,
            "/v1/movies/add",
            &token,
            json!({"title": "The Matrix", "director": "Wachowskis", "release_year": 1999}),
        )
        .await;
        post_ok(&router, "/v1/categories/create", &token, json!({"name": "Sci-Fi"})).await;
        post_ok(
            &router,
            "/v1/categories/add-movie",
            &token,
            json!({"category": "Sci-Fi", "movie_key": "Wachowskis: The Matrix"}),
        )
        .await;

        let updated = post_ok(
            &router,
            "/v1/movies/update",
            &token,
            json!({
                "key": "Wachowskis: The Matrix",
                "title": "The Matrix Reloaded",
                "director": "Wachowskis",
                "release_year": 2003,
                "series_name": "The Matrix"
            }),
        )
        .await;
        assert_eq!(updated["data"]["key"], "Wachowskis: The Matrix Reloaded");
        assert_eq!(updated["data"]["series_name"], "The Matrix");

        for category in ["Sci-Fi", "All%20Movies"] {
            let (status, shown) =
                send(&router, "GET", &format!("/v1/categories/{category}"), Some(&token), None)
                    .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(shown["data"]["movies"].as_array().map(Vec::len), Some(1));
            assert_eq!(shown["data"]["movies"][0]["key"], "Wachowskis: The Matrix Reloaded");
        }

        let (status, _) = send(
            &router,
            "POST",
            "/v1/movies/update",
            Some(&token),
            Some(json!({
                "key": "Wachowskis: The Matrix",
                "title": "Bound",
                "director": "Wachowskis",
                "release_year": 1996
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn remove_movie_through_the_router_reports_changes() {
        let db_path = unique_temp_db_path();
        let (router, token) = logged_in_router(db_path.clone()).await;
        post_ok(
            &router,
            "/v1/movies/add",
            &token,
            json!({"title": "Alien", "director": "Ridley Scott", "release_year": 1979}),
        )
        .await;
        let membership = json!({"category": "All Movies", "movie_key": "Ridley Scott: Alien"});

        let removed = post_ok(&router, "/v1/categories/remove-movie", &token, membership.clone()).await;
        assert_eq!(removed["data"]["changed"], true);
        let again = post_ok(&router, "/v1/categories/remove-movie", &token, membership).await;
        assert_eq!(again["data"]["changed"], false);

        let (status, all) =
            send(&router, "GET", "/v1/categories/All%20Movies", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all["data"]["movies"].as_array().map(Vec::len), Some(0));
        let (status, movies) = send(&router, "GET", "/v1/movies", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(movies["data"].as_array().map(Vec::len), Some(1));

        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn migrate_route_reports_an_up_to_date_schema() {
        let db_path = unique_temp_db_path();
        let router = app(ServiceState { api: ShelfApi::new(db_path.clone()) });

        let (status, migrated) = send(&router, "POST", "/v1/db/migrate", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(migrated["data"]["up_to_date"], true);

        let (status, reported) = send(&router, "POST", "/v1/db/schema-version", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reported["data"], migrated["data"]);

        let _ = std::fs::remove_file(&db_path);
    }

    #[test]
    fn bearer_token_requires_scheme_and_ulid() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(http::header::AUTHORIZATION, "Token abc".parse().unwrap_or_else(|err| {
            panic!("header value should parse: {err}")
        }));
        assert!(bearer_token(&headers).is_err());

        let token = SessionToken::new();
        headers.insert(
            http::header::AUTHORIZATION,
            format!("Bearer {token}")
                .parse()
                .unwrap_or_else(|err| panic!("header value should parse: {err}")),
        );
        assert_eq!(bearer_token(&headers).ok(), Some(token));
    }
}
