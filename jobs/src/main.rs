//! One-pass election data sync jobs.

#![warn(clippy::all, clippy::pedantic)]

use votesync_common::config::{self, RawConfig, SyncConfig};
use votesync_common::driver::{RunOptions, run_sync};
use votesync_common::entity::EntityKind;
use votesync_common::reconcile::SyncContext;
use votesync_common::relation::Relations;
use votesync_common::source::SourceClient;
use votesync_common::store::PocketStore;
use votesync_common::{CLIENT_VERSION, SyncStats};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Entities to sync, in order. Syncs everything when omitted.
    #[arg(value_enum)]
    entities: Vec<EntityKind>,

    /// The base URL of the record store
    #[arg(long, env = "VOTESYNC_STORE_URL")]
    store_url: Option<String>,

    /// The store account to authenticate as
    #[arg(long, env = "VOTESYNC_STORE_IDENTITY")]
    store_identity: Option<String>,

    /// The store account password
    #[arg(long, env = "VOTESYNC_STORE_PASSWORD", hide_env_values = true)]
    store_password: Option<String>,

    /// Bearer token for the election-reporting API
    #[arg(long, env = "VOTESYNC_SOURCE_TOKEN", hide_env_values = true)]
    source_token: Option<String>,

    /// Items requested per page from paginated endpoints
    #[arg(long, env = "VOTESYNC_PER_PAGE")]
    per_page: Option<u32>,

    /// Stop paginating after this many pages
    #[arg(long, env = "VOTESYNC_MAX_PAGES")]
    max_pages: Option<u32>,

    /// Show additional output
    #[arg(short, long, env = "VOTESYNC_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn selected_entities(&self) -> Vec<EntityKind> {
        if self.entities.is_empty() {
            EntityKind::ALL.to_vec()
        } else {
            self.entities.clone()
        }
    }

    fn raw_config(&self) -> RawConfig {
        RawConfig {
            store_url: self.store_url.clone(),
            store_identity: self.store_identity.clone(),
            store_password: self.store_password.clone(),
            source_token: self.source_token.clone(),
            per_page: self.per_page,
            max_pages: self.max_pages,
        }
    }
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// What happened to each selected entity.
#[derive(Debug, Default)]
struct RunReport {
    completed: Vec<(EntityKind, SyncStats)>,
    aborted: Vec<(EntityKind, anyhow::Error)>,
}

/// Sync each entity in turn. An aborted entity is logged and recorded, and
/// the remaining entities still run.
fn sync_each<F>(entities: &[EntityKind], mut sync: F) -> RunReport
where
    F: FnMut(EntityKind) -> Result<SyncStats>,
{
    let mut report = RunReport::default();
    for &entity in entities {
        println!("=== {entity} ===");
        match sync(entity) {
            Ok(stats) => {
                println!("{entity}: {stats}");
                println!();
                report.completed.push((entity, stats));
            }
            Err(e) => {
                error!("{e:#}");
                report.aborted.push((entity, e));
            }
        }
    }
    report
}

fn run(cli: &Cli) -> Result<RunReport> {
    let entities = cli.selected_entities();
    let config = SyncConfig::build(cli.raw_config(), &entities, |key| std::env::var(key).ok())?;
    if cli.verbose {
        println!("Entities: {entities:?}");
    }

    let mut store = PocketStore::new(&config.store_url, config.credentials.clone())?;
    let session = store
        .authenticate()
        .context("Could not authenticate against the store")?;
    info!("Store session established ({:?})", session.tier);

    let source = SourceClient::new(&config.source_token)?;
    let mut relations = Relations::new(&config.collections);
    let options = RunOptions {
        per_page: config.per_page,
        max_pages: config.max_pages,
    };

    Ok(sync_each(&entities, |entity| {
        let endpoint = config
            .source_url(entity)
            .with_context(|| format!("No source URL configured for {entity}"))?;
        let mut ctx = SyncContext {
            store: &store,
            relations: &mut relations,
            collections: &config.collections,
        };
        run_sync(entity.spec(), endpoint, &source, &mut ctx, options)
            .with_context(|| format!("Sync of {entity} aborted"))
    }))
}

fn main() {
    config::load_dotenv();
    let cli = Cli::parse();
    init_logger(cli.verbose);

    println!("Votesync Jobs v{CLIENT_VERSION} started.");
    let report = match run(&cli) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    if report.completed.len() + report.aborted.len() > 1 {
        println!("=== SUMMARY ===");
        for (entity, stats) in &report.completed {
            println!("{entity}: {stats}");
        }
        for (entity, _) in &report.aborted {
            println!("{entity}: aborted");
        }
    }
    if !report.aborted.is_empty() {
        for (_, e) in &report.aborted {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
