/**
 * COMMAND CENTER KERNEL - Point d'entrée principal du serveur
 *
 * RÔLE : Orchestration de tous les modules : config, stockage, refresher live, HTTP.
 * Bootstrap du système complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : API REST + stockage fichier JSON + caches live rafraîchis en tâche de fond.
 * UTILITÉ : Backend unique du tableau de bord opérationnel.
 *
 * USAGE :
 *   command-center-kernel          démarre le serveur
 *   command-center-kernel seed     réinitialise le stockage avec les données de démo
 */

mod config;
mod error;
mod health;
mod http;
mod live;
mod models;
mod state;
mod storage;

use crate::config::load_config;
use crate::live::LiveRefresher;
use crate::state::AppState;
use crate::storage::seed::seed_defaults;
use crate::storage::JsonStore;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("command_center_kernel=info")),
        )
        .init();

    let cfg = load_config().await.context("loading configuration")?;

    // stockage durable
    let store = JsonStore::open(cfg.storage.data_file.clone())
        .with_context(|| format!("opening data file {}", cfg.storage.data_file.display()))?;
    info!("[kernel] storage ready at {}", cfg.storage.data_file.display());

    if std::env::args().nth(1).as_deref() == Some("seed") {
        let report = seed_defaults(&store).context("seeding storage")?;
        info!("[kernel] seeded storage: {:?}", report);
        return Ok(());
    }

    // fabrique l'état unique pour Axum
    let app_state = AppState::new(Arc::new(store)).with_api_key(cfg.http.api_key.clone());
    if app_state.api_key.is_none() {
        warn!("[kernel] no api key configured, /api routes are open");
    }

    // refresher live : premier cycle immédiat puis à intervalle fixe
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = LiveRefresher::new(
        cfg.refresh.clone(),
        app_state.live.clone(),
        app_state.storage.clone(),
        app_state.tracker.clone(),
    )
    .context("building upstream http client")?;
    let refresher_handle = refresher.spawn(shutdown_rx);

    // HTTP
    let app = http::build_router(app_state);
    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("binding {}", cfg.http.bind))?;
    info!("[kernel] listening on http://{}", cfg.http.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("[kernel] failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("http server")?;

    info!("[kernel] shutting down");
    shutdown_tx.send(true).ok();
    if let Err(e) = refresher_handle.await {
        warn!("[kernel] refresher task ended abnormally: {}", e);
    }
    Ok(())
}
