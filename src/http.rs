//! HTTP server assembly and serving loop.

use crate::relay::{ProxyState, StoreState, health, proxy_subscribe, store_subscribe};
use axum::Router;
use axum::routing::{get, post};

/// Router for the upstream-proxying relay.
pub fn proxy_router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/subscribe", post(proxy_subscribe))
        .with_state(state)
}

/// Router for the store-backed relay.
pub fn store_router(state: StoreState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/subscribe", post(store_subscribe))
        .with_state(state)
}

/// Binds the listener and serves requests until the process is stopped.
pub async fn run_server(addr: &str, router: Router) -> Result<(), crate::error::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("entering serving loop");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::SignupStore;
    use axum::Json;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, header};
    use rstest::*;
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use testresult::TestResult;

    fn test_config(upstream_url: &str, api_key: Option<&str>) -> Config {
        Config {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 0,
            cooldown_seconds: 30,
            cooldown_state_path: ".signup-cooldown".into(),
            endpoint_url: None,
            transport: "opaque".to_string(),
            hidden_channel_timeout_seconds: 10,
            upstream_url: upstream_url.to_string(),
            upstream_api_key: api_key.map(String::from),
            upstream_timeout_seconds: 2,
            store_path: "signups.jsonl".into(),
            allowed_origins: Vec::new(),
        }
    }

    async fn serve(router: Router) -> TestResult<SocketAddr> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Ok(addr)
    }

    /// What the stub upstream API observed.
    #[derive(Clone, Default)]
    struct UpstreamSeen {
        hits: Arc<AtomicUsize>,
        auth: Arc<Mutex<Option<String>>>,
        body: Arc<Mutex<Option<Value>>>,
    }

    async fn upstream_accept(
        State(seen): State<UpstreamSeen>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        seen.hits.fetch_add(1, Ordering::SeqCst);
        *seen.auth.lock().unwrap() = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        *seen.body.lock().unwrap() = Some(body);
        Json(json!({ "id": 1 }))
    }

    async fn spawn_upstream() -> TestResult<(SocketAddr, UpstreamSeen)> {
        let seen = UpstreamSeen::default();
        let router = Router::new()
            .route("/members", axum::routing::post(upstream_accept))
            .with_state(seen.clone());
        Ok((serve(router).await?, seen))
    }

    async fn spawn_proxy(upstream_url: &str, api_key: Option<&str>) -> TestResult<SocketAddr> {
        let state = ProxyState {
            config: Arc::new(test_config(upstream_url, api_key)),
            client: reqwest::Client::new(),
        };
        serve(proxy_router(state)).await
    }

    async fn spawn_store(dir: &tempfile::TempDir) -> TestResult<(SocketAddr, Arc<SignupStore>)> {
        let store = Arc::new(SignupStore::open(dir.path().join("signups.jsonl"))?);
        let state = StoreState {
            config: Arc::new(test_config("http://unused.invalid/", None)),
            store: store.clone(),
        };
        Ok((serve(store_router(state)).await?, store))
    }

    #[tokio::test]
    async fn test_proxy_relays_to_upstream() -> TestResult {
        let (upstream, seen) = spawn_upstream().await?;
        let proxy = spawn_proxy(&format!("http://{upstream}/members"), Some("secret-key")).await?;

        let response = reqwest::Client::new()
            .post(format!("http://{proxy}/api/subscribe"))
            .json(&json!({ "email": "a@b.co" }))
            .send()
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.json::<Value>().await?, json!({ "success": true }));
        assert_eq!(seen.hits.load(Ordering::SeqCst), 1);
        assert_eq!(seen.auth.lock().unwrap().as_deref(), Some("secret-key"));
        assert_eq!(
            *seen.body.lock().unwrap(),
            Some(json!({ "email": "a@b.co", "status": "1" }))
        );
        Ok(())
    }

    #[rstest]
    #[case::missing(json!({}), "Email is required")]
    #[case::not_a_string(json!({ "email": 42 }), "Email is required")]
    #[case::bad_syntax(json!({ "email": "not-an-email" }), "Invalid email")]
    #[tokio::test]
    async fn test_proxy_rejects_bad_input(
        #[case] body: Value,
        #[case] message: &str,
    ) -> TestResult {
        let (upstream, seen) = spawn_upstream().await?;
        let proxy = spawn_proxy(&format!("http://{upstream}/members"), Some("secret-key")).await?;

        let response = reqwest::Client::new()
            .post(format!("http://{proxy}/api/subscribe"))
            .json(&body)
            .send()
            .await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>().await?,
            json!({ "error": message })
        );
        assert_eq!(seen.hits.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_proxy_without_credential_is_500() -> TestResult {
        let (upstream, seen) = spawn_upstream().await?;
        let proxy = spawn_proxy(&format!("http://{upstream}/members"), None).await?;

        let response = reqwest::Client::new()
            .post(format!("http://{proxy}/api/subscribe"))
            .json(&json!({ "email": "a@b.co" }))
            .send()
            .await?;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<Value>().await?,
            json!({ "error": "Server configuration error" })
        );
        assert_eq!(seen.hits.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_proxy_upstream_error_is_502() -> TestResult {
        let failing = Router::new().route(
            "/members",
            axum::routing::post(|| async {
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
            }),
        );
        let upstream = serve(failing).await?;
        let proxy = spawn_proxy(&format!("http://{upstream}/members"), Some("secret-key")).await?;

        let response = reqwest::Client::new()
            .post(format!("http://{proxy}/api/subscribe"))
            .json(&json!({ "email": "a@b.co" }))
            .send()
            .await?;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.json::<Value>().await?,
            json!({ "error": "Newsletter signup failed" })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_proxy_unreachable_upstream_is_502() -> TestResult {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let dead = listener.local_addr()?;
        drop(listener);
        let proxy = spawn_proxy(&format!("http://{dead}/members"), Some("secret-key")).await?;

        let response = reqwest::Client::new()
            .post(format!("http://{proxy}/api/subscribe"))
            .json(&json!({ "email": "a@b.co" }))
            .send()
            .await?;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_post_is_405() -> TestResult {
        let (upstream, _seen) = spawn_upstream().await?;
        let proxy = spawn_proxy(&format!("http://{upstream}/members"), Some("secret-key")).await?;
        let dir = tempfile::tempdir()?;
        let (store_addr, _) = spawn_store(&dir).await?;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{proxy}/api/subscribe"))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = client
            .get(format!("http://{store_addr}/subscribe"))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_ok_then_duplicate() -> TestResult {
        let dir = tempfile::tempdir()?;
        let (addr, store) = spawn_store(&dir).await?;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{addr}/subscribe"))
            .form(&[("email", "a@b.co")])
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.json::<Value>().await?, json!({ "status": "ok" }));

        let response = client
            .post(format!("http://{addr}/subscribe"))
            .form(&[("email", "a@b.co")])
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.json::<Value>().await?,
            json!({ "status": "duplicate", "message": "Already registered" })
        );

        assert_eq!(store.address_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_invalid_email_is_400() -> TestResult {
        let dir = tempfile::tempdir()?;
        let (addr, store) = spawn_store(&dir).await?;

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/subscribe"))
            .form(&[("email", "not-an-email")])
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>().await?,
            json!({ "status": "error", "message": "Invalid email" })
        );
        assert_eq!(store.address_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_health_probe() -> TestResult {
        let dir = tempfile::tempdir()?;
        let (addr, _) = spawn_store(&dir).await?;

        let response = reqwest::get(format!("http://{addr}/")).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.json::<Value>().await?,
            json!({ "status": "ok", "message": "Service is running" })
        );
        Ok(())
    }

    // Full client pipeline against a live store relay.
    #[tokio::test]
    async fn test_submit_pipeline_end_to_end() -> TestResult {
        use crate::controller::{Settlement, SubmissionController};
        use crate::rate_limiter::CooldownGate;
        use crate::transport::HiddenChannelTransport;
        use std::time::Duration;

        let dir = tempfile::tempdir()?;
        let (addr, store) = spawn_store(&dir).await?;

        struct QuietSink;
        impl crate::controller::StatusSink for QuietSink {
            fn show_success(&self, _: &str) {}
            fn show_error(&self, _: &str) {}
            fn clear_message(&self) {}
            fn set_loading(&self, _: bool) {}
            fn clear_input(&self) {}
            fn focus_input(&self) {}
        }

        let transport = HiddenChannelTransport::new(
            format!("http://{addr}/subscribe"),
            Duration::from_secs(2),
        )?;
        let gate = CooldownGate::new(dir.path().join("cooldown"), Duration::from_secs(30));
        let mut controller = SubmissionController::new(transport, gate, QuietSink);

        let settlement = controller.submit("  pipeline@example.org ", "").await;
        assert_eq!(settlement, Settlement::Success);
        assert_eq!(store.address_count(), 1);
        Ok(())
    }
}
