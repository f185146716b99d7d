use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use halo_dispatch::db::{self, CallRepo, InsightRepo, TranscriptRepo};
use halo_dispatch::triage::{OpenAiTriage, TriageGateway, TriageService};
use halo_dispatch::{Config, api};

/// Halo - emergency call triage gateway for AI-assisted dispatch
#[derive(Parser)]
#[command(name = "halo", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "HALO_PORT")]
    port: Option<u16>,

    /// Path to the SQLite database file
    #[arg(long, env = "HALO_DB_PATH")]
    db: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create or migrate the database schema and exit
    InitDb,
    /// Run an out-of-band triage pass over a call's accumulated transcript
    Triage {
        /// External call identifier issued by the voice platform
        #[arg(short, long)]
        call: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,halo_dispatch=info",
        1 => "info,halo_dispatch=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(db_path) = cli.db {
        config.db_path = db_path;
    }

    match cli.command {
        Some(Command::InitDb) => {
            db::init(&config.db_path)?;
            tracing::info!(path = %config.db_path.display(), "database ready");
            Ok(())
        }
        Some(Command::Triage { call }) => triage_call(&config, &call).await,
        None => serve(config).await,
    }
}

/// Run the webhook gateway
async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.port,
        db = %config.db_path.display(),
        "starting halo dispatch gateway"
    );
    config.warn_on_gaps();

    let pool = db::init(&config.db_path)?;
    let server = api::ApiServer::new(&config, pool);
    server.run().await?;

    Ok(())
}

/// One triage pass for a single call, from the command line
async fn triage_call(config: &Config, external_call_id: &str) -> anyhow::Result<()> {
    let pool = db::init(&config.db_path)?;

    let calls = CallRepo::new(pool.clone());
    let gateway: Option<Arc<dyn TriageGateway>> = config
        .openai_api_key
        .clone()
        .map(|key| Arc::new(OpenAiTriage::new(key)) as Arc<dyn TriageGateway>);
    if gateway.is_none() {
        tracing::warn!("OPENAI_API_KEY not set, the pass will record the unscored default");
    }

    let service = TriageService::new(
        gateway,
        calls.clone(),
        TranscriptRepo::new(pool.clone()),
        InsightRepo::new(pool),
    );

    anyhow::ensure!(
        calls.get(external_call_id)?.is_some(),
        "no session found for call {external_call_id}"
    );

    let outcome = service.annotate_from_history(external_call_id).await?;

    let concerns = if outcome.concerns.is_empty() {
        "none".to_string()
    } else {
        outcome
            .concerns
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!(
        "call {external_call_id}: urgency {}{} | concerns: {concerns}",
        outcome.score,
        if outcome.scored { "" } else { " (unscored)" }
    );

    Ok(())
}
