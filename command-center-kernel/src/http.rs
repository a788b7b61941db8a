/**
 * API REST COMMAND CENTER - Serveur HTTP du kernel
 *
 * RÔLE :
 * Expose les tables (serveurs, tickets, métriques, utilisateurs, réglages)
 * au tableau de bord, plus l'état du refresher live.
 *
 * FONCTIONNEMENT :
 * - Lectures serveurs/métriques : cache live si peuplé, sinon stockage durable
 * - Écritures : toujours vers le stockage, jamais vers le cache
 *   (les deux sources ne sont pas réconciliées : un PATCH n'est pas visible
 *   en lecture tant que le cache live est peuplé)
 * - Erreurs : corps JSON `{"error": "..."}` (400 validation, 404, 500 lecture)
 *
 * SÉCURITÉ :
 * - Header x-api-key exigé sur toutes les routes sauf /health, si une clé est configurée
 */

use crate::error::{parse_id, ApiError, Payload};
use crate::health::{KernelHealth, RefreshStatus};
use crate::models::{
    NetworkMetric, NewNetworkMetric, NewServer, NewSystemMetric, NewTicket, NewUser, PublicUser, Server,
    ServerPatch, Settings, SettingsPatch, SystemMetric, Ticket, TicketPatch, UserPatch,
};
use crate::state::AppState;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use std::collections::HashMap;
use tracing::warn;

pub const DEFAULT_NETWORK_LIMIT: usize = 20;
pub const MAX_NETWORK_LIMIT: i64 = 100;

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    // Health check toujours accessible
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }
    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!("[http] rejected request without valid api key: {}", req.uri().path());
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/api/live/status", get(get_live_status))
        .route("/api/servers", get(list_servers).post(create_server))
        .route("/api/servers/{id}", patch(update_server).delete(delete_server))
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/{id}", patch(update_ticket).delete(delete_ticket))
        .route("/api/network-metrics", get(list_network_metrics).post(create_network_metric))
        .route("/api/system-metrics", post(create_system_metric))
        .route("/api/system-metrics/latest", get(latest_system_metric))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route("/api/settings", get(get_settings).patch(update_settings))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

/// `?limit=N` borné à 1..=100 ; absent ou sans chiffres en tête = 20
pub fn clamp_limit(raw: Option<&str>) -> usize {
    match raw.and_then(leading_integer) {
        Some(n) => n.clamp(1, MAX_NETWORK_LIMIT) as usize,
        None => DEFAULT_NETWORK_LIMIT,
    }
}

/// Entier en tête de chaîne, signe optionnel : "12abc" -> 12, "1.5" -> 1.
/// Un nombre trop grand sature au lieu d'être rejeté.
fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

// GET /system/health (uptime + caches + refresher)
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.tracker.health(app.live.sizes()))
}

// GET /api/live/status
async fn get_live_status(State(app): State<AppState>) -> Json<RefreshStatus> {
    Json(app.tracker.status())
}

// ---------------------------------------------------------------------------
// Serveurs
// ---------------------------------------------------------------------------

async fn list_servers(State(app): State<AppState>) -> Result<Json<Vec<Server>>, ApiError> {
    let live = app.live.servers();
    if !live.is_empty() {
        return Ok(Json(live));
    }
    let servers = app
        .storage
        .list_servers()
        .map_err(|e| ApiError::internal("Failed to fetch servers", e))?;
    Ok(Json(servers))
}

async fn create_server(
    State(app): State<AppState>,
    Payload(new): Payload<NewServer>,
) -> Result<(StatusCode, Json<Server>), ApiError> {
    let server = app
        .storage
        .create_server(new)
        .map_err(|e| ApiError::write_failed("Invalid server data", e))?;
    Ok((StatusCode::CREATED, Json(server)))
}

async fn update_server(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Payload(patch): Payload<ServerPatch>,
) -> Result<Json<Server>, ApiError> {
    let id = parse_id(&id)?;
    app.storage
        .update_server(id, patch)
        .map_err(|e| ApiError::write_failed("Failed to update server", e))?
        .map(Json)
        .ok_or(ApiError::NotFound("Server not found"))
}

async fn delete_server(State(app): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    app.storage
        .delete_server(id)
        .map_err(|e| ApiError::write_failed("Failed to delete server", e))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

async fn list_tickets(State(app): State<AppState>) -> Result<Json<Vec<Ticket>>, ApiError> {
    let tickets = app
        .storage
        .list_tickets()
        .map_err(|e| ApiError::internal("Failed to fetch tickets", e))?;
    Ok(Json(tickets))
}

async fn create_ticket(
    State(app): State<AppState>,
    Payload(new): Payload<NewTicket>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let ticket = app
        .storage
        .create_ticket(new)
        .map_err(|e| ApiError::write_failed("Invalid ticket data", e))?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn update_ticket(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Payload(patch): Payload<TicketPatch>,
) -> Result<Json<Ticket>, ApiError> {
    let id = parse_id(&id)?;
    app.storage
        .update_ticket(id, patch)
        .map_err(|e| ApiError::write_failed("Failed to update ticket", e))?
        .map(Json)
        .ok_or(ApiError::NotFound("Ticket not found"))
}

async fn delete_ticket(State(app): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    app.storage
        .delete_ticket(id)
        .map_err(|e| ApiError::write_failed("Failed to delete ticket", e))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Métriques
// ---------------------------------------------------------------------------

async fn list_network_metrics(
    State(app): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<NetworkMetric>>, ApiError> {
    let limit = clamp_limit(params.get("limit").map(String::as_str));

    let live = app.live.network_metrics(limit);
    if !live.is_empty() {
        return Ok(Json(live));
    }
    let metrics = app
        .storage
        .recent_network_metrics(limit)
        .map_err(|e| ApiError::internal("Failed to fetch network metrics", e))?;
    Ok(Json(metrics))
}

async fn create_network_metric(
    State(app): State<AppState>,
    Payload(new): Payload<NewNetworkMetric>,
) -> Result<(StatusCode, Json<NetworkMetric>), ApiError> {
    let metric = app
        .storage
        .create_network_metric(new)
        .map_err(|e| ApiError::write_failed("Invalid metric data", e))?;
    Ok((StatusCode::CREATED, Json(metric)))
}

async fn latest_system_metric(State(app): State<AppState>) -> Result<Json<Option<SystemMetric>>, ApiError> {
    if let Some(metric) = app.live.system_metric() {
        return Ok(Json(Some(metric)));
    }
    let metric = app
        .storage
        .latest_system_metric()
        .map_err(|e| ApiError::internal("Failed to fetch system metrics", e))?;
    Ok(Json(metric))
}

async fn create_system_metric(
    State(app): State<AppState>,
    Payload(new): Payload<NewSystemMetric>,
) -> Result<(StatusCode, Json<SystemMetric>), ApiError> {
    let metric = app
        .storage
        .create_system_metric(new)
        .map_err(|e| ApiError::write_failed("Invalid metric data", e))?;
    Ok((StatusCode::CREATED, Json(metric)))
}

// ---------------------------------------------------------------------------
// Utilisateurs (jamais de mot de passe dans les réponses)
// ---------------------------------------------------------------------------

async fn list_users(State(app): State<AppState>) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = app
        .storage
        .list_users()
        .map_err(|e| ApiError::internal("Failed to fetch users", e))?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

async fn get_user(State(app): State<AppState>, Path(id): Path<String>) -> Result<Json<PublicUser>, ApiError> {
    app.storage
        .get_user(&id)
        .map_err(|e| ApiError::internal("Failed to fetch user", e))?
        .map(|u| Json(PublicUser::from(&u)))
        .ok_or(ApiError::NotFound("User not found"))
}

async fn create_user(
    State(app): State<AppState>,
    Payload(new): Payload<NewUser>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let user = app
        .storage
        .create_user(new)
        .map_err(|e| ApiError::write_failed("Invalid user data", e))?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

async fn update_user(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Payload(patch): Payload<UserPatch>,
) -> Result<Json<PublicUser>, ApiError> {
    app.storage
        .update_user(&id, patch)
        .map_err(|e| ApiError::write_failed("Failed to update user", e))?
        .map(|u| Json(PublicUser::from(&u)))
        .ok_or(ApiError::NotFound("User not found"))
}

async fn delete_user(State(app): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    app.storage
        .delete_user(&id)
        .map_err(|e| ApiError::write_failed("Failed to delete user", e))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Réglages
// ---------------------------------------------------------------------------

async fn get_settings(State(app): State<AppState>) -> Result<Json<Settings>, ApiError> {
    let settings = app
        .storage
        .get_settings()
        .map_err(|e| ApiError::internal("Failed to fetch settings", e))?;
    Ok(Json(settings))
}

async fn update_settings(
    State(app): State<AppState>,
    Payload(patch): Payload<SettingsPatch>,
) -> Result<Json<Settings>, ApiError> {
    let settings = app
        .storage
        .update_settings(patch)
        .map_err(|e| ApiError::internal("Failed to update settings", e))?;
    Ok(Json(settings))
}
