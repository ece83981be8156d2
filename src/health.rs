//! Health check HTTP endpoint
//!
//! Exposes /health, /ready and /metrics for monitoring systems (Kubernetes,
//! load balancers, etc.), reporting on the reconcile backstop loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timeout for reading HTTP request (prevents slow-loris attacks)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Point-in-time view of the reconcile loop
#[derive(Debug, Clone)]
pub struct ReconcileStatus {
    /// Number of reconcile passes that completed
    pub passes_succeeded: u64,
    /// Number of reconcile passes that failed
    pub passes_failed: u64,
    /// Timestamp of last pass (Unix epoch seconds)
    pub last_pass_time: u64,
    /// Whether the last pass succeeded
    pub last_pass_ok: bool,
}

/// Shared reconcile metrics updated from the backstop loop
#[derive(Debug)]
pub struct ReconcileMetrics {
    passes_succeeded: AtomicU64,
    passes_failed: AtomicU64,
    last_pass_time: AtomicU64,
    last_pass_ok: AtomicBool,
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self {
            passes_succeeded: AtomicU64::new(0),
            passes_failed: AtomicU64::new(0),
            last_pass_time: AtomicU64::new(0),
            // Assume healthy until proven otherwise
            last_pass_ok: AtomicBool::new(true),
        }
    }
}

impl ReconcileMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed reconcile pass
    pub fn record_success(&self) {
        self.passes_succeeded.fetch_add(1, Ordering::Relaxed);
        self.last_pass_time.store(now_epoch_secs(), Ordering::Relaxed);
        self.last_pass_ok.store(true, Ordering::Relaxed);
    }

    /// Record a failed reconcile pass
    pub fn record_failure(&self) {
        self.passes_failed.fetch_add(1, Ordering::Relaxed);
        self.last_pass_time.store(now_epoch_secs(), Ordering::Relaxed);
        self.last_pass_ok.store(false, Ordering::Relaxed);
    }

    pub fn status(&self) -> ReconcileStatus {
        ReconcileStatus {
            passes_succeeded: self.passes_succeeded.load(Ordering::Relaxed),
            passes_failed: self.passes_failed.load(Ordering::Relaxed),
            last_pass_time: self.last_pass_time.load(Ordering::Relaxed),
            last_pass_ok: self.last_pass_ok.load(Ordering::Relaxed),
        }
    }
}

fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Run the health check HTTP server
pub async fn run_health_server(
    port: u16,
    metrics: Arc<ReconcileMetrics>,
    cancel_token: CancellationToken,
) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind health check server on port {}: {}", port, e);
            return;
        }
    };

    info!("Health check server listening on http://0.0.0.0:{}/health", port);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((mut socket, peer_addr)) => {
                        let metrics = metrics.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_request(&mut socket, &metrics).await {
                                debug!("Error handling request from {}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Health check server shutting down");
                break;
            }
        }
    }
}

async fn handle_request(
    socket: &mut tokio::net::TcpStream,
    metrics: &ReconcileMetrics,
) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];

    // Apply timeout to prevent slow-loris attacks
    let n = match timeout(REQUEST_TIMEOUT, socket.read(&mut buf)).await {
        Ok(result) => result?,
        Err(_) => {
            debug!("Request timeout after {:?}", REQUEST_TIMEOUT);
            return Ok(());
        }
    };

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..n]);

    // Parse the request line to get the path
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let response = match path {
        "/health" | "/healthz" | "/health/" => {
            let status = metrics.status();
            build_health_response(&status)
        }
        "/ready" | "/readyz" | "/ready/" => {
            // Readiness logic for Kubernetes compatibility:
            // - Before the first pass (last_pass_time == 0): ready=true, so
            //   pods are not killed before the loop has run once.
            // - After the first pass: ready = last_pass_ok.
            let status = metrics.status();
            if status.last_pass_ok || status.last_pass_time == 0 {
                build_ready_response(true)
            } else {
                build_ready_response(false)
            }
        }
        "/metrics" => {
            let status = metrics.status();
            build_metrics_response(&status)
        }
        _ => build_not_found_response(),
    };

    socket.write_all(response.as_bytes()).await?;
    socket.flush().await?;

    Ok(())
}

fn build_health_response(status: &ReconcileStatus) -> String {
    let body = format!(
        r#"{{"status":"healthy","passes_succeeded":{},"passes_failed":{},"last_pass_time":{},"last_pass_ok":{}}}"#,
        status.passes_succeeded, status.passes_failed, status.last_pass_time, status.last_pass_ok
    );

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn build_ready_response(ready: bool) -> String {
    let (status_code, status_text, body) = if ready {
        (200, "OK", r#"{"ready":true}"#)
    } else {
        (503, "Service Unavailable", r#"{"ready":false}"#)
    };

    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    )
}

fn build_metrics_response(status: &ReconcileStatus) -> String {
    // Prometheus-compatible metrics format
    let body = format!(
        "# HELP deskhours_reconcile_passes_total Total number of reconcile passes\n\
         # TYPE deskhours_reconcile_passes_total counter\n\
         deskhours_reconcile_passes_total{{result=\"success\"}} {}\n\
         deskhours_reconcile_passes_total{{result=\"failure\"}} {}\n\
         # HELP deskhours_last_pass_timestamp Unix timestamp of last reconcile pass\n\
         # TYPE deskhours_last_pass_timestamp gauge\n\
         deskhours_last_pass_timestamp {}\n\
         # HELP deskhours_last_pass_ok Whether the last pass succeeded (1) or failed (0)\n\
         # TYPE deskhours_last_pass_ok gauge\n\
         deskhours_last_pass_ok {}\n",
        status.passes_succeeded,
        status.passes_failed,
        status.last_pass_time,
        if status.last_pass_ok { 1 } else { 0 }
    );

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn build_not_found_response() -> String {
    let body = r#"{"error":"Not Found"}"#;
    format!(
        "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}
