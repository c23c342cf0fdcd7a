use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use movie_shelf_api::{
    CombineRequest, Credentials, MembershipRequest, RenameCategoryRequest, Session, ShelfApi,
    ShelfConfig, UpdateMovieRequest,
};
use movie_shelf_core::MovieInput;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod console;

use console::Console;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "shelf")]
#[command(about = "Movie Shelf CLI")]
struct Cli {
    /// `SQLite` database path. Overrides `MOVIE_SHELF_DB` and the config file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML config file. Defaults to the per-user config directory when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, env = "MOVIE_SHELF_USER", global = true)]
    user: Option<String>,

    #[arg(long, env = "MOVIE_SHELF_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: Box<DbCommand>,
    },
    User {
        #[command(subcommand)]
        command: Box<UserCommand>,
    },
    Movie {
        #[command(subcommand)]
        command: Box<MovieCommand>,
    },
    Category {
        #[command(subcommand)]
        command: Box<CategoryCommand>,
    },
    /// Reload the shelf from the database and report its size.
    Refresh,
    /// Interactive numbered menu.
    Console,
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    /// Create any missing tables. Safe to repeat.
    Migrate,
    /// Replace all movies and categories with the sample collection.
    Seed,
    IntegrityCheck,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Create the account named by `--user` with `--password`.
    Register,
}

#[derive(Debug, Subcommand)]
enum MovieCommand {
    Add(MovieArgs),
    Update(UpdateMovieArgs),
    List,
    Show(MovieKeyArgs),
}

#[derive(Debug, Args)]
struct MovieArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    director: String,
    #[arg(long)]
    year: i32,
    /// Marks the movie as owned and part of a series.
    #[arg(long)]
    series_name: Option<String>,
}

impl MovieArgs {
    fn to_input(&self) -> MovieInput {
        let input = MovieInput::new(&self.title, &self.director, self.year);
        match &self.series_name {
            Some(series_name) => input.with_series_name(series_name),
            None => input,
        }
    }
}

#[derive(Debug, Args)]
struct UpdateMovieArgs {
    /// Current `director: title` key.
    #[arg(long)]
    key: String,
    #[command(flatten)]
    movie: MovieArgs,
}

#[derive(Debug, Args)]
struct MovieKeyArgs {
    #[arg(long)]
    key: String,
}

#[derive(Debug, Subcommand)]
enum CategoryCommand {
    List,
    Show(CategoryNameArgs),
    Create(CategoryNameArgs),
    Delete(CategoryNameArgs),
    Rename(RenameArgs),
    AddMovie(MembershipArgs),
    RemoveMovie(MembershipArgs),
    Combine(CombineArgs),
}

#[derive(Debug, Args)]
struct CategoryNameArgs {
    #[arg(long)]
    name: String,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    new_name: String,
}

#[derive(Debug, Args)]
struct MembershipArgs {
    #[arg(long)]
    category: String,
    /// Movie key, `director: title`.
    #[arg(long)]
    movie: String,
}

impl MembershipArgs {
    fn to_request(&self) -> MembershipRequest {
        MembershipRequest { category: self.category.clone(), movie_key: self.movie.clone() }
    }
}

#[derive(Debug, Args)]
struct CombineArgs {
    #[arg(long)]
    first: String,
    #[arg(long)]
    second: String,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn emit<T: serde::Serialize>(value: &T) -> Result<()> {
    emit_json(serde_json::to_value(value)?)
}

fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .with_context(|| format!("invalid log filter `{default_filter}`"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ShelfConfig::load(cli.config.as_deref())?;
    init_tracing(config.log_filter())?;

    let db_path = config.resolve_db_path(cli.db.clone());
    debug!(db = %db_path.display(), "opening movie shelf");
    let api = ShelfApi::new(db_path);

    match cli.command {
        Command::Db { command } => run_db(*command, &api),
        Command::User { command } => {
            let credentials = credentials(cli.user.as_deref(), cli.password.as_deref())?;
            run_user(*command, &api, &credentials)
        }
        Command::Movie { command } => {
            let session = login(&api, cli.user.as_deref(), cli.password.as_deref())?;
            run_movie(*command, &api, &session)
        }
        Command::Category { command } => {
            let session = login(&api, cli.user.as_deref(), cli.password.as_deref())?;
            run_category(*command, &api, &session)
        }
        Command::Refresh => {
            let session = login(&api, cli.user.as_deref(), cli.password.as_deref())?;
            emit(&api.refresh(&session)?)
        }
        Command::Console => {
            let session = login(&api, cli.user.as_deref(), cli.password.as_deref())?;
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let result = Console::new(&api, &session, stdin.lock(), stdout.lock()).run();
            api.logout(&session.token);
            result
        }
    }
}

fn credentials(user: Option<&str>, password: Option<&str>) -> Result<Credentials> {
    let username = user.ok_or_else(|| anyhow!("--user (or MOVIE_SHELF_USER) is required"))?;
    let password =
        password.ok_or_else(|| anyhow!("--password (or MOVIE_SHELF_PASSWORD) is required"))?;
    Ok(Credentials { username: username.to_string(), password: password.to_string() })
}

fn login(api: &ShelfApi, user: Option<&str>, password: Option<&str>) -> Result<Session> {
    api.login(&credentials(user, password)?)
}

fn run_db(command: DbCommand, api: &ShelfApi) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => emit(&api.schema_status()?),
        DbCommand::Migrate => emit(&api.migrate()?),
        DbCommand::Seed => emit(&api.seed_sample_data()?),
        DbCommand::IntegrityCheck => emit(&api.integrity_check()?),
    }
}

fn run_user(command: UserCommand, api: &ShelfApi, credentials: &Credentials) -> Result<()> {
    match command {
        UserCommand::Register => emit(&api.register(credentials)?),
    }
}

fn run_movie(command: MovieCommand, api: &ShelfApi, session: &Session) -> Result<()> {
    match command {
        MovieCommand::Add(args) => emit(&api.add_movie(session, &args.to_input())?),
        MovieCommand::Update(args) => {
            let request = UpdateMovieRequest { key: args.key.clone(), movie: args.movie.to_input() };
            emit(&api.update_movie(session, &request)?)
        }
        MovieCommand::List => emit(&api.movies(session)?),
        MovieCommand::Show(args) => emit(&api.movie(session, &args.key)?),
    }
}

fn run_category(command: CategoryCommand, api: &ShelfApi, session: &Session) -> Result<()> {
    match command {
        CategoryCommand::List => emit(&api.categories(session)?),
        CategoryCommand::Show(args) => emit(&api.category(session, &args.name)?),
        CategoryCommand::Create(args) => emit(&api.create_category(session, &args.name)?),
        CategoryCommand::Delete(args) => emit(&api.delete_category(session, &args.name)?),
        CategoryCommand::Rename(args) => emit(&api.rename_category(
            session,
            &RenameCategoryRequest { name: args.name, new_name: args.new_name },
        )?),
        CategoryCommand::AddMovie(args) => {
            emit(&api.add_to_category(session, &args.to_request())?)
        }
        CategoryCommand::RemoveMovie(args) => {
            emit(&api.remove_from_category(session, &args.to_request())?)
        }
        CategoryCommand::Combine(args) => emit(&api.combine_categories(
            session,
            &CombineRequest { first: args.first, second: args.second },
        )?),
    }
}
