use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use covid_planner::{
    Planner,
    config::{Config, generate_config},
    journal, process, utils, web,
};
use home::home_dir;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(
        short = 'c',
        long = "config",
        default_value_t = ("~/.config/covid-planner.json").to_string()
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the journal and serve the planner page.
    Start,
    /// Print the pending alarms and active notifications from the journal.
    List {
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
}

fn expand_path(path_str: &str) -> PathBuf {
    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path_str)
}

fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(logfile) = config.logfile.as_deref() else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
        return Ok(None);
    };

    let path = expand_path(logfile);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("logfile {logfile:?} has no file name"))?;
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();
    Ok(Some(guard))
}

async fn start(config: Config) -> anyhow::Result<()> {
    let journal_path = expand_path(&config.journal);
    let mut planner = Planner::from_config(&config, &journal_path)
        .await
        .context("cannot restore planner state")?;
    planner.prime(Local::now()).await;

    let mode = planner.mode();
    let planner = Arc::new(Mutex::new(planner));
    let _tasks = process::start(
        Arc::clone(&planner),
        mode,
        Duration::from_secs(config.tick_secs.max(1)),
    );

    web::serve(&config.server, planner).await
}

fn list(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let journal_path = expand_path(&config.journal);
    let lines = journal::read_lines(&journal_path)?;
    let state = journal::replay(&lines)?;

    println!("alarms:");
    for (i, alarm) in state.scheduler.alarms().enumerate() {
        println!("{}. {}", i, alarm.title);
        if verbose {
            println!(
                "\t{}\n\tweather: {}\n\tnews: {}",
                utils::describe_fire_time(&alarm.fire_time),
                alarm.weather,
                alarm.news,
            )
        }
    }

    println!("notifications:");
    for (i, notif) in state.notifications.list_active().iter().enumerate() {
        println!("{}. {}", i, notif.title);
        if verbose {
            println!("\t{}", notif.content)
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = expand_path(&args.config);
    generate_config(&config_path)
        .with_context(|| format!("error while generating config {}", config_path.display()))?;
    let config = Config::open(&config_path)?;

    let _guard = init_logging(&config)?;

    match args.command {
        Commands::Start => start(config).await?,
        Commands::List { verbose } => list(&config, verbose)?,
    }
    Ok(())
}
