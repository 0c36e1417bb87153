//! Attune CLI entry point.

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use serde_json::Value;
use std::fs;
use std::path::Path;

mod cli;

use attune::config::Config;
use attune::deploy::FileDeploymentStore;
use attune::drift::DriftStatus;
use attune::migrate::migrate;
use attune::profile::ProfileKind;
use attune::session::{CommitReport, Session};
use attune::markup;
use cli::{Cli, Command};

fn logger(verbose: bool) -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder
}

fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("attune.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    logger(verbose).target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    if setup_logging(&config, cli.verbose).is_err() {
        logger(cli.verbose).init();
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main(cli, config))
}

async fn async_main(cli: Cli, config: Config) -> Result<()> {
    info!("Starting with config from: {:?}", cli.config);

    match cli.command {
        Some(Command::Render { file, kind }) => {
            let kind = parse_kind(&kind)?;
            let text = read_file(&file)?;
            print!("{}", markup::serialize(&markup::parse(kind, &text)));
            Ok(())
        }
        Some(Command::Import { kind, file }) => {
            let kind = parse_kind(&kind)?;
            let text = read_file(&file)?;
            let mut session = open_session(&config)?;
            let report = session.import_text(kind, &text);
            print_commit(&report, &format!("Imported {} profile from {}", kind, file.display()));
            Ok(())
        }
        Some(Command::Show { kind }) => {
            let kind = parse_kind(&kind)?;
            let session = open_session(&config)?;
            print!("{}", session.serialize(kind));
            Ok(())
        }
        Some(Command::Edit { path, value }) => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            let mut session = open_session(&config)?;
            let report = session
                .apply_edit(&path, value)
                .with_context(|| format!("Failed to apply edit to {}", path))?;
            if report.recorded {
                print_commit(&report, &format!("Updated {}", path));
            } else {
                println!("{} {} unchanged", "○".yellow(), path);
            }
            Ok(())
        }
        Some(Command::Migrate { file }) => {
            let raw: Value = serde_json::from_str(&read_file(&file)?).context("Snapshot is not valid JSON")?;
            let state = migrate(raw).context("Failed to migrate snapshot")?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        Some(Command::Load) => {
            let mut session = open_session(&config)?;
            let store = FileDeploymentStore::new(config.deploy_dir());
            if session.load_deployed(&store).await? {
                println!("{} Loaded deployed documents from {}", "✓".green(), store.dir().display());
            } else {
                println!("{} Nothing has been deployed yet", "○".yellow());
            }
            Ok(())
        }
        Some(Command::Deploy) => {
            let mut session = open_session(&config)?;
            let store = FileDeploymentStore::new(config.deploy_dir());
            match session.deploy(&store).await {
                Ok(status) => {
                    println!("{} Deployed to {}", "✓".green(), store.dir().display());
                    print_status(&status);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{} {}", "✗".red(), e);
                    Err(eyre!("Deploy failed"))
                }
            }
        }
        Some(Command::Status) | None => show_status(&config).await,
    }
}

fn parse_kind(kind: &str) -> Result<ProfileKind> {
    kind.parse::<ProfileKind>().context("Expected 'subject' or 'persona'")
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn open_session(config: &Config) -> Result<Session> {
    Session::from_config(config).context("Failed to open workspace")
}

async fn show_status(config: &Config) -> Result<()> {
    let mut session = open_session(config)?;
    let store = FileDeploymentStore::new(config.deploy_dir());
    session
        .track_deployed(&store)
        .await
        .context("Failed to read deployed documents")?;

    if config.snapshot_path().exists() {
        println!("{} Workspace: {}", "✓".green(), config.snapshot_path().display());
    } else {
        println!("{} Workspace is empty", "○".yellow());
    }
    for kind in ProfileKind::ALL {
        let profile = session.get_model(kind);
        let name = if profile.name().is_empty() { "(unnamed)" } else { profile.name() };
        println!("  {:<8} {}", kind.as_str(), name.cyan());
    }
    print_status(&session.drift_status());
    Ok(())
}

fn print_status(status: &DriftStatus) {
    match status {
        DriftStatus::InSync { .. } => println!("{} {}", "✓".green(), status),
        DriftStatus::Differs { .. } => println!("{} {}", "!".yellow(), status),
        DriftStatus::NoBaseline => println!("{} {}", "○".yellow(), status),
    }
}

fn print_commit(report: &CommitReport, message: &str) {
    println!("{} {} (revision {})", "✓".green(), message, report.revision);
    if let Some(e) = &report.persist_error {
        eprintln!("{} Not saved: {}", "✗".red(), e);
    }
}
