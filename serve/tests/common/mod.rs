//! Shared helpers for the HTTP surface's end-to-end tests.

use serde_json::Value;
use serve::ProviderEnv;
use tokio::net::TcpListener;

/// Binds to a random port and spawns the server. Returns the base `http://` URL
/// and the server's join handle.
pub async fn spawn_server() -> (
    String,
    tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{}", addr);
    let handle = tokio::spawn(serve::run_serve_on_listener(listener, ProviderEnv::default(), None));
    // give the accept loop a moment to start before the first request lands.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    (url, handle)
}

/// Parses an NDJSON response body into one `Value` per line.
pub fn parse_ndjson(body: &str) -> Vec<Value> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
