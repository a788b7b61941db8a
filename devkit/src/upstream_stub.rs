/*!
Stub HTTP des sources externes

Serveur axum local (127.0.0.1, port éphémère) qui remplace les trois API
interrogées par le refresher. Chaque route a un comportement réglable à chaud
(JSON, statut d'erreur, réponse lente, corps illisible) et compte ses appels.
*/

use crate::fixtures::UpstreamPayloads;
use crate::test_utils::init_test_logging;
use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamRoute {
    Regions,
    NetworkMeta,
    RateLimit,
}

impl UpstreamRoute {
    pub const ALL: [UpstreamRoute; 3] = [UpstreamRoute::Regions, UpstreamRoute::NetworkMeta, UpstreamRoute::RateLimit];

    pub fn path(self) -> &'static str {
        match self {
            UpstreamRoute::Regions => "/regions",
            UpstreamRoute::NetworkMeta => "/meta",
            UpstreamRoute::RateLimit => "/rate_limit",
        }
    }

    /// Payload servi tant qu'aucun comportement n'est imposé
    fn default_payload(self) -> Value {
        match self {
            UpstreamRoute::Regions => UpstreamPayloads::regions(10),
            UpstreamRoute::NetworkMeta => UpstreamPayloads::network_meta(),
            UpstreamRoute::RateLimit => UpstreamPayloads::rate_limit(4000, 5000),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StubBehavior {
    Json(Value),
    Status(u16),
    Delayed(Duration, Value),
    /// 200 avec un corps qui n'est pas du JSON
    Garbage,
}

impl StubBehavior {
    pub fn json(body: Value) -> Self {
        StubBehavior::Json(body)
    }

    pub fn delayed(delay: Duration, body: Value) -> Self {
        StubBehavior::Delayed(delay, body)
    }
}

struct RouteSlot {
    behavior: StubBehavior,
    hits: usize,
}

type Routes = Arc<Mutex<HashMap<UpstreamRoute, RouteSlot>>>;

pub struct UpstreamStub {
    addr: SocketAddr,
    routes: Routes,
    server: JoinHandle<()>,
}

impl UpstreamStub {
    pub async fn start() -> Result<Self> {
        init_test_logging();

        let routes: Routes = Arc::new(Mutex::new(
            UpstreamRoute::ALL
                .into_iter()
                .map(|r| (r, RouteSlot { behavior: StubBehavior::Json(r.default_payload()), hits: 0 }))
                .collect(),
        ));

        let app = Router::new()
            .route(UpstreamRoute::Regions.path(), get(|State(r): State<Routes>| respond(r, UpstreamRoute::Regions)))
            .route(UpstreamRoute::NetworkMeta.path(), get(|State(r): State<Routes>| respond(r, UpstreamRoute::NetworkMeta)))
            .route(UpstreamRoute::RateLimit.path(), get(|State(r): State<Routes>| respond(r, UpstreamRoute::RateLimit)))
            .with_state(routes.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[stub] upstream server stopped: {}", e);
            }
        });

        log::info!("🧪 [STUB] upstream sources listening on {}", addr);
        Ok(Self { addr, routes, server })
    }

    pub fn url(&self, route: UpstreamRoute) -> String {
        format!("http://{}{}", self.addr, route.path())
    }

    pub fn set(&self, route: UpstreamRoute, behavior: StubBehavior) {
        let mut routes = self.routes.lock().unwrap();
        if let Some(slot) = routes.get_mut(&route) {
            slot.behavior = behavior;
        }
    }

    /// Nombre d'appels reçus sur une route
    pub fn hits(&self, route: UpstreamRoute) -> usize {
        self.routes.lock().unwrap().get(&route).map(|s| s.hits).unwrap_or(0)
    }
}

impl Drop for UpstreamStub {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn respond(routes: Routes, route: UpstreamRoute) -> Response {
    let behavior = {
        let mut routes = routes.lock().unwrap();
        match routes.get_mut(&route) {
            Some(slot) => {
                slot.hits += 1;
                slot.behavior.clone()
            }
            None => StubBehavior::Status(404),
        }
    };

    match behavior {
        StubBehavior::Json(body) => Json(body).into_response(),
        StubBehavior::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        StubBehavior::Delayed(delay, body) => {
            tokio::time::sleep(delay).await;
            Json(body).into_response()
        }
        StubBehavior::Garbage => ([(header::CONTENT_TYPE, "application/json")], "{\"regions\": [").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_payloads_and_hits() {
        let stub = UpstreamStub::start().await.unwrap();
        let body: Value = reqwest::get(stub.url(UpstreamRoute::Regions)).await.unwrap().json().await.unwrap();
        assert_eq!(body.as_array().unwrap().len(), 10);
        assert_eq!(stub.hits(UpstreamRoute::Regions), 1);
        assert_eq!(stub.hits(UpstreamRoute::RateLimit), 0);
    }

    #[tokio::test]
    async fn test_behavior_can_be_swapped() {
        let stub = UpstreamStub::start().await.unwrap();
        stub.set(UpstreamRoute::RateLimit, StubBehavior::Status(503));
        let resp = reqwest::get(stub.url(UpstreamRoute::RateLimit)).await.unwrap();
        assert_eq!(resp.status().as_u16(), 503);

        stub.set(UpstreamRoute::RateLimit, StubBehavior::Garbage);
        let resp = reqwest::get(stub.url(UpstreamRoute::RateLimit)).await.unwrap();
        assert!(resp.status().is_success());
        assert!(resp.json::<Value>().await.is_err());
    }
}
