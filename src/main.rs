//! skirmish - tabletop combat adjudicator

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use skirmish::combat::{ActionSink, CombatManager, JsonlSink, TracingSink};
use skirmish::{CombatResponse, CombatService, Config, Encounter, ResponseBody};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Placeholder in replay files for the most recently created session
const SESSION_PLACEHOLDER: &str = "$session";

#[derive(Parser, Debug)]
#[command(name = "skirmish", version, about = "Tabletop RPG combat adjudicator")]
struct Args {
    /// Config file (defaults to ./skirmish.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an encounter file as an automated battle and print the report
    Simulate {
        #[arg(short, long)]
        encounter: PathBuf,

        /// Overrides the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Overrides the configured round limit
        #[arg(long)]
        max_rounds: Option<u32>,
    },
    /// Feed JSON requests (one per line) through the engine
    Replay {
        #[arg(short, long)]
        requests: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "skirmish=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn open_sink(config: &Config) -> Result<Arc<dyn ActionSink>> {
    match &config.action_log {
        Some(path) => {
            let sink = JsonlSink::open(path)
                .map_err(|e| anyhow!("Failed to open action log {}: {}", path.display(), e))?;
            info!("Writing actions to {}", path.display());
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(TracingSink)),
    }
}

/// Fill in a missing or placeholder `session` field
fn bind_session(request: &mut Value, current: Option<Uuid>) {
    let Some(obj) = request.as_object_mut() else {
        return;
    };
    let Some(id) = current else {
        return;
    };
    let needs_id = match obj.get("session") {
        None => obj.get("op").and_then(Value::as_str).is_some_and(|op| {
            !matches!(op, "create_session" | "list_sessions")
        }),
        Some(Value::String(s)) => s == SESSION_PLACEHOLDER,
        Some(_) => false,
    };
    if needs_id {
        obj.insert("session".to_string(), Value::String(id.to_string()));
    }
}

async fn simulate(config: Config, path: PathBuf) -> Result<()> {
    let encounter = Encounter::load(&path)?;
    let manager = CombatManager::new(config.rules(), open_sink(&config)?, config.seed);
    let id = manager.create_session(&encounter.name).await;
    let report = manager
        .with_session(id, |s| {
            encounter.populate(s)?;
            s.run_battle()
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn replay(config: Config, path: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&path)
        .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
    let manager = CombatManager::new(config.rules(), open_sink(&config)?, config.seed);
    let service = CombatService::new(Arc::new(manager));

    let mut current: Option<Uuid> = None;
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let response = match serde_json::from_str::<Value>(line) {
            Ok(mut request) => {
                bind_session(&mut request, current);
                service.handle_json(&request.to_string()).await
            }
            Err(_) => service.handle_json(line).await,
        };
        if let CombatResponse::Ok {
            result: ResponseBody::SessionCreated(id),
        } = &response
        {
            current = Some(*id);
        }
        println!("{}", serde_json::to_string(&response)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Simulate {
            encounter,
            seed,
            max_rounds,
        } => {
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(n) = max_rounds {
                config.max_rounds = n;
            }
            simulate(config, encounter).await
        }
        Command::Replay { requests } => replay(config, requests).await,
    }
}
