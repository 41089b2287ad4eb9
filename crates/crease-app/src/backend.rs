// Backend selection: a seeded local store or the remote fantasy server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crease_client::{HttpApi, HttpSettings};
use crease_core::api::FantasyApi;
use crease_core::catalog::Slot;
use crease_store::{import, LocalStore};

use crate::config::{BackendKind, Config, StoreConfig};

/// Build the backend named by `config.backend.kind`.
pub fn connect(config: &Config) -> anyhow::Result<Arc<dyn FantasyApi>> {
    match config.backend.kind {
        BackendKind::Local => {
            let store = LocalStore::open(&config.store.db_path)
                .with_context(|| format!("failed to open store at {}", config.store.db_path))?;
            seed_store(&store, &config.store)?;
            info!("Using local store at {}", config.store.db_path);
            Ok(Arc::new(store))
        }
        BackendKind::Http => {
            let base_url = config
                .backend
                .base_url
                .clone()
                .context("backend.base_url is required for the http backend")?;
            let mut settings = HttpSettings::new(base_url);
            settings.slots_path = config.backend.slots_path.clone();
            settings.timeout = Duration::from_secs(config.backend.timeout_secs);
            settings.token = config.credentials.token.clone();
            if settings.token.is_none() {
                tracing::warn!("No token in credentials.toml; requests will be anonymous");
            }
            info!("Using fantasy server at {}", settings.base_url);
            let api = HttpApi::new(settings).context("failed to build HTTP client")?;
            Ok(Arc::new(api))
        }
    }
}

/// Upsert configured slots, contests and the player CSV into the store.
/// Re-running is harmless: every write is an upsert.
pub fn seed_store(store: &LocalStore, seed: &StoreConfig) -> anyhow::Result<()> {
    if !seed.slots.is_empty() {
        let slots: Vec<Slot> = seed.slots.iter().map(|s| s.to_slot()).collect();
        store.upsert_slots(&slots).context("failed to seed slots")?;
    }

    if let Some(csv_path) = &seed.players_csv {
        let players = import::load_players(Path::new(csv_path))
            .with_context(|| format!("failed to load players from {csv_path}"))?;
        store
            .upsert_players(&players)
            .context("failed to seed players")?;
    }

    for contest in &seed.contests {
        store
            .upsert_contest(contest)
            .with_context(|| format!("failed to seed contest {}", contest.id))?;
    }

    for points in &seed.contest_points {
        let rows = import::load_contest_points(Path::new(&points.csv))
            .with_context(|| format!("failed to load contest points from {}", points.csv))?;
        store
            .set_contest_points(&points.contest_id, &rows)
            .with_context(|| format!("failed to seed points for contest {}", points.contest_id))?;
    }

    Ok(())
}
