//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use format_gateway::config::GatewayConfig;
use format_gateway::http::{AppState, HttpServer};
use format_gateway::lifecycle::Shutdown;
use format_gateway::resilience::{FixedJitter, NoopObserver, ResilientExecutor};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a programmable mock upstream on an ephemeral port.
///
/// `f` receives the 1-based call number and returns the status and body.
pub async fn start_programmable_upstream<F, Fut>(f: F) -> (SocketAddr, Arc<AtomicU32>)
where
    F: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let f = Arc::new(f);

    let counter = calls.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                drain_request(&mut socket).await;

                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let (status, body) = f(call).await;
                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");

                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len(),
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, calls)
}

/// Read one request (headers plus `Content-Length` body) so closing the
/// socket never resets a half-sent request.
async fn drain_request(socket: &mut tokio::net::TcpStream) {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        data.extend_from_slice(&chunk[..n]);

        let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if data.len() >= end + 4 + length {
            return;
        }
    }
}

/// Upstream that answers every call with the same status and body.
pub async fn start_fixed_upstream(status: u16, body: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    start_programmable_upstream(move |_| async move { (status, body.to_string()) }).await
}

pub fn formatted(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

/// Configuration pointing at `upstream` with fast, deterministic retries.
pub fn test_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.url = format!("http://{upstream}/v1/format");
    config.upstream.timeout_ms = 2_000;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config.retry.jitter = false;
    config.admin.enabled = true;
    config.admin.api_key = "admin-secret".to_string();
    config
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<()>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve a gateway for `config` on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let executor = ResilientExecutor::new(config.circuit_breaker.to_breaker_config())
        .with_defaults(config.retry.to_retry_config())
        .with_jitter(Arc::new(FixedJitter(1.0)))
        .with_observer(Arc::new(NoopObserver));

    let shutdown = Shutdown::new();
    let state = AppState::with_executor(config, executor, shutdown.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::from_state(state.clone());
    let handle = tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });

    TestGateway {
        addr,
        state,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Poll `calls` until it reaches `expected` or a second passes.
pub async fn wait_for_calls(calls: &AtomicU32, expected: u32) {
    for _ in 0..100 {
        if calls.load(Ordering::SeqCst) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
