use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use shift_db::{Database, EventFilter, User};
use tracing_subscriber::EnvFilter;

use shift_cli::commands::util::parse_bound;
use shift_cli::commands::{admin, clock, events, export, status, summary, whoami};
use shift_cli::identity::{require_admin, resolve_user};
use shift_cli::{AdminCommand, Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(cli: &Cli) -> Result<(Database, Config)> {
    let mut config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(claims) = &cli.claims {
        config.claims_path = Some(claims.clone());
    }
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

/// Opens the database and resolves the caller from the token claims.
fn open_session(cli: &Cli) -> Result<(Database, Config, User)> {
    let (mut db, config) = open_database(cli)?;
    let user = resolve_user(&mut db, &config, Utc::now())?;
    Ok((db, config, user))
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

fn event_filter(user_id: Option<i64>, from: Option<&str>, to: Option<&str>) -> Result<EventFilter> {
    Ok(EventFilter {
        user_id,
        from: parse_bound(from, "from")?,
        to: parse_bound(to, "to")?,
    })
}

fn run_admin(cli: &Cli, command: &AdminCommand) -> Result<()> {
    let (mut db, config, user) = open_session(cli)?;
    require_admin(&user)?;
    let mut stdout = io::stdout().lock();

    match command {
        AdminCommand::Users { json } => admin::users(&mut stdout, &db, *json)?,
        AdminCommand::Events { user_id, from, to } => {
            let filter = event_filter(*user_id, from.as_deref(), to.as_deref())?;
            admin::events(&mut stdout, &mut db, &user, &filter)?;
        }
        AdminCommand::Status { json } => admin::status(&mut stdout, &db, config.locale, *json)?,
        AdminCommand::Export {
            format,
            output,
            user_id,
            from,
            to,
        } => {
            let filter = event_filter(*user_id, from.as_deref(), to.as_deref())?;
            drop(stdout);
            let mut writer = open_output(output.as_deref())?;
            let count = export::run(&mut writer, &mut db, &user, &filter, *format, config.locale)?;
            writer.flush()?;
            if let Some(path) = output {
                eprintln!("Exported {count} event(s) to {}", path.display());
            }
        }
        AdminCommand::Audit { limit, json } => admin::audit(&mut stdout, &db, *limit, *json)?,
        AdminCommand::SetActive { user_id, active } => {
            admin::set_active(&mut stdout, &mut db, &user, *user_id, *active)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Clock {
            action,
            ip,
            user_agent,
            meta,
            json,
        }) => {
            let (mut db, config, user) = open_session(&cli)?;
            let metadata =
                clock::metadata(config.source, ip.clone(), user_agent.clone(), meta.as_deref())?;
            clock::run(
                &mut io::stdout().lock(),
                &mut db,
                &user,
                (*action).into(),
                &metadata,
                *json,
                Utc::now(),
            )?;
        }
        Some(Commands::Status { json }) => {
            let (db, config, user) = open_session(&cli)?;
            status::run(&mut io::stdout().lock(), &db, &user, config.locale, *json)?;
        }
        Some(Commands::Events { from, to }) => {
            let (db, _config, user) = open_session(&cli)?;
            let from = parse_bound(from.as_deref(), "from")?;
            let to = parse_bound(to.as_deref(), "to")?;
            events::run(&mut io::stdout().lock(), &db, &user, from, to)?;
        }
        Some(Commands::Summary { from, to, json }) => {
            let (db, _config, user) = open_session(&cli)?;
            let range = (
                parse_bound(from.as_deref(), "from")?,
                parse_bound(to.as_deref(), "to")?,
            );
            let tz_name = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
            summary::run(
                &mut io::stdout().lock(),
                &db,
                &user,
                range,
                *json,
                &chrono::Local,
                &tz_name,
            )?;
        }
        Some(Commands::Whoami { json }) => {
            let (_db, _config, user) = open_session(&cli)?;
            whoami::run(&mut io::stdout().lock(), &user, *json)?;
        }
        Some(Commands::Admin(command)) => run_admin(&cli, command)?,
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
