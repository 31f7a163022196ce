//! didhub-sync - operator CLI for identity and relationship sync
//!
//! Inspect how identifiers normalize, which owner a record would get, and
//! what a relationship edit would change, offline or against a live API.

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use didhub_sync::{
    desired_edges, diff, normalize_ids, CachedSearch, EntityRef, HttpRelationshipStore,
    HttpSearch, OwnerCandidates, Reconciler, RelationshipForm, RelationshipRecord, StoreConfig,
    SyncConfig,
};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "didhub-sync")]
#[command(about = "Identity normalization and relationship sync for DIDHub")]
struct Args {
    /// JSON file with cache, reconciler and store settings
    #[arg(long, env = "DIDHUB_SYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    api: ApiArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

/// API connection overrides
#[derive(ClapArgs, Debug, Clone)]
struct ApiArgs {
    /// DIDHub API base URL
    #[arg(long, env = "DIDHUB_API_URL")]
    api_url: Option<String>,

    /// Bearer token for the API
    #[arg(long, env = "DIDHUB_API_KEY")]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "DIDHUB_API_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl ApiArgs {
    fn apply(&self, store: &mut StoreConfig) {
        if let Some(ref url) = self.api_url {
            store.base_url = url.clone();
        }
        if self.api_key.is_some() {
            store.api_key = self.api_key.clone();
        }
        if let Some(secs) = self.timeout_secs {
            store.timeout_secs = secs;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the canonical ids a raw value normalizes to
    Normalize {
        /// JSON value or plain string
        value: String,
    },
    /// Resolve the owner of a new record
    Owner {
        /// Subject id from the route
        #[arg(long)]
        route: Option<String>,
        /// Acting session's user id
        #[arg(long)]
        session: Option<String>,
    },
    /// Diff a form against stored records from a JSON file, without the API
    Plan {
        /// File with `{ "subject", "current", "form" }`
        file: PathBuf,
    },
    /// Reconcile one entity's relationships against the live API
    Sync {
        /// Entity being edited, as `A:<uuid>` or `U:<uuid>`
        #[arg(long)]
        subject: String,
        /// JSON file holding the relationship form
        #[arg(long)]
        form: PathBuf,
        /// Print the plan instead of applying it
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
    /// Run a search lookup
    Search {
        /// "alters" or "users"
        scope: String,
        query: String,
    },
}

#[derive(Debug, Deserialize)]
struct PlanInput {
    subject: String,
    #[serde(default)]
    current: Vec<RelationshipRecord>,
    #[serde(default)]
    form: RelationshipForm,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    let mut config = match args.config {
        Some(ref path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SyncConfig::from_json(&raw)?
        }
        None => SyncConfig::default(),
    };
    args.api.apply(&mut config.store);
    config.validate()?;

    match args.command {
        Command::Normalize { value } => {
            let parsed = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            for id in normalize_ids(&parsed) {
                println!("{id}");
            }
        }
        Command::Owner { route, session } => {
            let mut candidates = OwnerCandidates::new();
            if let Some(route) = route {
                candidates = candidates.route_subject(route);
            }
            if let Some(session) = session {
                candidates = candidates.session_user(session);
            }
            match candidates.resolve() {
                Some(owner) => println!("{} ({:?})", owner.id, owner.source),
                None => bail!("no candidate normalized to a valid id"),
            }
        }
        Command::Plan { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let input: PlanInput = serde_json::from_str(&raw)?;
            let subject = parse_subject(&input.subject)?;

            let current: Vec<_> = input
                .current
                .into_iter()
                .filter_map(|record| {
                    let id = record.id.clone();
                    let edge = record.into_edge();
                    if edge.is_none() {
                        warn!(remote_id = %id, "Skipping malformed stored record");
                    }
                    edge
                })
                .collect();
            let desired = desired_edges(&subject, &input.form);
            let plan = diff(&subject, &desired.edges, &current);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Sync {
            subject,
            form,
            dry_run,
        } => {
            let subject = parse_subject(&subject)?;
            let raw = std::fs::read_to_string(&form)
                .with_context(|| format!("reading {}", form.display()))?;
            let form: RelationshipForm = serde_json::from_str(&raw)?;

            let store = Arc::new(HttpRelationshipStore::new(config.store.clone())?);
            let reconciler = Reconciler::new(store, config.reconciler.clone());

            if dry_run {
                let plan = reconciler.plan(&subject, &form).await?;
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }

            let report = reconciler.reconcile(&subject, &form).await?;
            info!(
                created = report.created.len(),
                deleted = report.deleted.len(),
                unchanged = report.unchanged,
                "Sync finished"
            );
            for failure in &report.failures {
                eprintln!("{:?} {} failed: {}", failure.kind, failure.edge, failure.error);
            }
            if !report.is_complete() {
                std::process::exit(2);
            }
        }
        Command::Search { scope, query } => {
            let lookup = Arc::new(HttpSearch::new(config.store.clone())?);
            let search = CachedSearch::new(lookup, config.cache.clone());
            for hit in search.search(&scope, &query).await? {
                println!("{}\t{}", hit.entity.to_mixed(), hit.label);
            }
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("didhub_sync={},info", log_level).into());

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn parse_subject(raw: &str) -> anyhow::Result<EntityRef> {
    EntityRef::parse_mixed(raw)
        .with_context(|| format!("subject must look like A:<uuid> or U:<uuid>, got {raw:?}"))
}
