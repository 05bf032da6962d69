//! Microgrid simulator entry point: CLI wiring for the dispatch loop, the
//! database and the HTTP service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use microgrid_sim::config::{RunMode, ScenarioConfig};
use microgrid_sim::db::Database;
use microgrid_sim::io::export::export_log_csv;
use microgrid_sim::publisher::{self, NullPublisher, StatePublisher};
use microgrid_sim::runner::Runner;

#[derive(Parser)]
#[command(name = "microgrid-sim")]
#[command(about = "Battery and PV dispatch for compute-node microgrids", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema and insert the demo job rows
    InitDb {
        /// SQLite file (default: value from the scenario, else database.db)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Only create the tables
        #[arg(long)]
        no_seed: bool,

        #[command(flatten)]
        scenario: ScenarioArgs,
    },

    /// Run the dispatch loop
    Run {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Override the number of ticks
        #[arg(long)]
        steps: Option<usize>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Pace ticks by wall-clock time
        #[arg(long)]
        realtime: bool,

        /// Write every grid's step log to this CSV file
        #[arg(long)]
        log_out: Option<PathBuf>,

        /// Do not post state to the HTTP endpoint
        #[arg(long)]
        no_post: bool,

        /// Also start the HTTP service in this process
        #[arg(long)]
        serve: bool,
    },

    /// Run the HTTP service only
    Serve {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// Override the listening port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the built-in presets
    Presets,
}

#[derive(Args)]
struct ScenarioArgs {
    /// Scenario TOML file
    #[arg(short, long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in preset name
    #[arg(long)]
    preset: Option<String>,
}

impl ScenarioArgs {
    /// `--config` wins over `--preset`; with neither the demo preset is used.
    fn load(&self) -> Result<ScenarioConfig> {
        if let Some(path) = &self.config {
            info!(path = %path.display(), "loading scenario");
            return ScenarioConfig::from_toml_file(path)
                .with_context(|| format!("invalid scenario {}", path.display()));
        }
        let name = self.preset.as_deref().unwrap_or("demo");
        Ok(ScenarioConfig::from_preset(name)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::InitDb {
            database,
            no_seed,
            scenario,
        } => {
            let config = scenario.load()?;
            let path = database.unwrap_or(config.database.path);
            let db = open_database(&path)?;
            if !no_seed {
                let inserted = db.seed_demo().context("failed to seed demo jobs")?;
                println!("{}: {inserted} demo rows inserted", path.display());
            } else {
                println!("{}: schema ready", path.display());
            }
        }
        Command::Run {
            scenario,
            steps,
            seed,
            realtime,
            log_out,
            no_post,
            serve,
        } => {
            let mut config = scenario.load()?;
            if let Some(steps) = steps {
                config.simulation.steps = steps;
            }
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }
            if realtime {
                config.simulation.mode = RunMode::Realtime;
            }
            run(config, log_out.as_deref(), no_post, serve).await?;
        }
        Command::Serve { scenario, port } => {
            let mut config = scenario.load()?;
            if let Some(port) = port {
                config.api.port = port;
            }
            serve_only(config).await?;
        }
        Command::Presets => {
            for name in ScenarioConfig::PRESETS {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn open_database(path: &Path) -> Result<Database> {
    Database::open(path).with_context(|| format!("failed to open database {}", path.display()))
}

async fn run(
    mut config: ScenarioConfig,
    log_out: Option<&Path>,
    no_post: bool,
    serve: bool,
) -> Result<()> {
    let db = Arc::new(open_database(&config.database.path)?);
    if config.database.seed_on_init {
        db.seed_demo().context("failed to seed demo jobs")?;
    }

    if serve {
        spawn_api(&config, Arc::clone(&db)).await?;
        if config.api.post_url.is_empty() {
            config.api.post_url = config.api.local_insert_url();
            info!(url = %config.api.post_url, "posting state to the local API");
        }
    }

    let publisher: Box<dyn StatePublisher> = if no_post {
        Box::new(NullPublisher)
    } else {
        publisher::from_config(&config.api).context("failed to build HTTP client")?
    };

    let mut runner = Runner::from_config(&config, db, publisher)?;
    let summary = runner.run().await?;

    for (name, report) in &summary.reports {
        println!("\n== {name} ==\n{report}");
    }
    if summary.publish_failures > 0 {
        println!(
            "\n{} of {} ticks could not be published",
            summary.publish_failures, summary.steps
        );
    }

    if let Some(path) = log_out {
        export_log_csv(runner.grids(), path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "step log written");
    }

    if serve {
        info!("run finished, API still serving; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await.context("failed to wait for Ctrl-C")?;
    }
    Ok(())
}

#[cfg(feature = "api")]
async fn spawn_api(config: &ScenarioConfig, db: Arc<Database>) -> Result<()> {
    use microgrid_sim::api::{AppState, serve_listener};

    let addr = config.api.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let state = Arc::new(AppState::new(Some(db)));
    tokio::spawn(async move {
        if let Err(e) = serve_listener(state, listener).await {
            tracing::error!(error = %e, "API server stopped");
        }
    });
    Ok(())
}

#[cfg(not(feature = "api"))]
async fn spawn_api(_config: &ScenarioConfig, _db: Arc<Database>) -> Result<()> {
    anyhow::bail!("--serve needs the \"api\" feature")
}

#[cfg(feature = "api")]
async fn serve_only(config: ScenarioConfig) -> Result<()> {
    use microgrid_sim::api::{AppState, serve_listener};

    let db = Arc::new(open_database(&config.database.path)?);
    let addr = config.api.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let state = Arc::new(AppState::new(Some(db)));

    tokio::select! {
        result = serve_listener(state, listener) => result.context("API server failed")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}

#[cfg(not(feature = "api"))]
async fn serve_only(_config: ScenarioConfig) -> Result<()> {
    anyhow::bail!("serve needs the \"api\" feature")
}
