use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("malformed body: {0}")]
    Decode(String),
}

/// GET + décodage JSON, borné par `timeout` (réponse ET corps).
/// Le futur de la requête est abandonné à l'expiration, ce qui coupe la connexion.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<T, FetchError> {
    let request = async {
        let response = client.get(url).send().await.map_err(FetchError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let bytes = response.bytes().await.map_err(FetchError::Transport)?;
        serde_json::from_slice::<T>(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    };

    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_center_devkit::{StubBehavior, UpstreamRoute, UpstreamStub};
    use serde_json::Value;

    #[tokio::test]
    async fn test_fetch_json_ok() {
        let stub = UpstreamStub::start().await.unwrap();
        stub.set(UpstreamRoute::RateLimit, StubBehavior::json(serde_json::json!({"ok": true})));

        let client = reqwest::Client::new();
        let body: Value = fetch_json(&client, &stub.url(UpstreamRoute::RateLimit), DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_fetch_json_timeout() {
        let stub = UpstreamStub::start().await.unwrap();
        stub.set(
            UpstreamRoute::RateLimit,
            StubBehavior::delayed(Duration::from_millis(500), serde_json::json!({})),
        );

        let client = reqwest::Client::new();
        let err = fetch_json::<Value>(&client, &stub.url(UpstreamRoute::RateLimit), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_fetch_json_status_and_decode_errors() {
        let stub = UpstreamStub::start().await.unwrap();
        let client = reqwest::Client::new();

        stub.set(UpstreamRoute::Regions, StubBehavior::Status(503));
        let err = fetch_json::<Value>(&client, &stub.url(UpstreamRoute::Regions), DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 503));

        stub.set(UpstreamRoute::Regions, StubBehavior::Garbage);
        let err = fetch_json::<Value>(&client, &stub.url(UpstreamRoute::Regions), DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_json_transport_error() {
        // port fermé : connexion refusée
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = reqwest::Client::new();
        let err = fetch_json::<Value>(&client, &format!("http://{addr}/"), DEFAULT_FETCH_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
