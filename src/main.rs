use anyhow::Result;
use clap::{App, AppSettings, Arg, SubCommand};
use commitblog::build::{generate, rebuild_index, IndexOutcome};
use commitblog::config::{Config, SourceKind};
use commitblog::git::GitLogSource;
use commitblog::github::GitHubSource;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = App::new("commitblog")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generates blog posts from a project's commit history")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("project")
                .long("project")
                .short("p")
                .takes_value(true)
                .value_name("DIR")
                .global(true)
                .help("The project directory (default: the current directory)"),
        )
        .subcommand(
            SubCommand::with_name("generate")
                .about("Writes posts for new commits and rebuilds the index"),
        )
        .subcommand(
            SubCommand::with_name("index").about("Rebuilds the index from the posts directory"),
        )
        .get_matches();

    let (command, sub_matches) = matches.subcommand();
    let project = matches
        .value_of("project")
        .or_else(|| sub_matches.and_then(|m| m.value_of("project")));
    let project = match project {
        Some(dir) => std::fs::canonicalize(Path::new(dir))?,
        None => std::env::current_dir()?,
    };
    let config = Config::from_directory(&project)?;

    match command {
        "generate" => {
            let report = match config.source {
                SourceKind::GitHub => {
                    let source = GitHubSource::new(
                        config.api_base.clone(),
                        config.repository.clone(),
                        config.days_back,
                        config.token.clone(),
                    )?;
                    generate(&config, &source)?
                }
                SourceKind::Git => {
                    let source = GitLogSource::new(
                        config.git_directory.clone(),
                        config.days_back,
                        Some(&config.repository),
                    )?;
                    generate(&config, &source)?
                }
            };
            tracing::info!(
                fetched = report.fetched,
                excluded = report.excluded,
                existing = report.existing,
                written = report.written.len(),
                "done"
            );
            log_index(&report.index);
        }
        "index" => log_index(&rebuild_index(&config)?),
        _ => unreachable!("clap requires a subcommand"),
    }
    Ok(())
}

fn log_index(outcome: &IndexOutcome) {
    match outcome {
        IndexOutcome::Written(index) => {
            for entry in &index.entries {
                tracing::debug!(date = %entry.date, title = %entry.title, "indexed");
            }
        }
        IndexOutcome::Empty => tracing::warn!("index not written: no posts"),
    }
}
