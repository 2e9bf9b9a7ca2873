//! Schema tool for the chat database.
//!
//! Usage:
//!   cargo run -p chat-api --bin chat-migrate                 apply pending migrations
//!   cargo run -p chat-api --bin chat-migrate -- --dry-run    list pending migrations
//!   cargo run -p chat-api --bin chat-migrate -- --revert     roll back the newest migration
//!
//! Add `--test` to target the `_test` database next to DATABASE_URL, which is
//! read from the environment (or .env via dotenvy).

use std::path::Path;

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Apply,
    DryRun,
    Revert,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    action: Action,
    test_db: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut parsed = Args {
            action: Action::Apply,
            test_db: false,
        };
        for arg in args {
            let action = match arg.as_str() {
                "--test" => {
                    parsed.test_db = true;
                    continue;
                }
                "--dry-run" => Action::DryRun,
                "--revert" => Action::Revert,
                other => return Err(format!("unknown argument: {other}")),
            };
            if parsed.action != Action::Apply {
                return Err("--dry-run and --revert are mutually exclusive".to_string());
            }
            parsed.action = action;
        }
        Ok(parsed)
    }
}

fn main() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let mut database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL env var is required");
    if args.test_db {
        database_url = test_database_url(&database_url);
    }

    let mut conn = PgConnection::establish(&database_url).expect("failed to connect to database");

    match args.action {
        Action::DryRun => {
            let pending = conn
                .pending_migrations(MIGRATIONS)
                .expect("failed to read migration state");
            if pending.is_empty() {
                println!("Schema is up to date.");
            }
            for migration in &pending {
                println!("  pending: {}", migration.name());
            }
        }
        Action::Revert => {
            let reverted = conn
                .revert_last_migration(MIGRATIONS)
                .expect("failed to revert migration");
            println!("Reverted {reverted}.");
        }
        Action::Apply => {
            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .expect("failed to run migrations");
            for migration in &applied {
                println!("  applied: {migration}");
            }
            println!("{} migration(s) applied.", applied.len());
        }
    }
}

/// `postgres://host/haloochat?x=y` becomes `postgres://host/haloochat_test?x=y`.
/// URLs already pointing at a `_test` database are left alone.
fn test_database_url(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };
    let Some((host, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    match query {
        Some(query) => format!("{host}/{db_name}_test?{query}"),
        None => format!("{host}/{db_name}_test"),
    }
}
