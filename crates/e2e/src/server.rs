//! Server management - running the web server for functional tests
//!
//! [`LiveServer`] serves the router in-process on an ephemeral port, one per
//! test. [`ServerHandle`] spawns the `superlists-web` binary instead and
//! health checks it, for runs against the real executable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use superlists_common::ItemStore;
use superlists_web::WebServer;

use crate::error::{E2eError, E2eResult};

/// How long a stopping server may take to drain connections
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The web application served in-process on `127.0.0.1` and a free port
pub struct LiveServer {
    addr: SocketAddr,
    store: ItemStore,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<anyhow::Result<()>>>,
}

impl LiveServer {
    /// Serve a fresh in-memory store
    pub async fn start() -> E2eResult<Self> {
        Self::with_store(ItemStore::open_memory()?).await
    }

    /// Serve an existing store
    pub async fn with_store(store: ItemStore) -> E2eResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let server = WebServer::new(store.clone());
        let task = tokio::spawn(server.serve_with_shutdown(listener, async move {
            let _ = signal.await;
        }));

        info!("Live server started at http://{}", addr);
        Ok(Self {
            addr,
            store,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    /// Base URL, without a trailing slash
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The store behind the server, for asserting on persisted state
    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    /// Shut down and wait for the serving task to finish
    pub async fn stop(mut self) -> E2eResult<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => {
                debug!("Live server at {} stopped", self.addr);
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(E2eError::ServerStartup(e.to_string())),
            Ok(Err(e)) => Err(E2eError::ServerStartup(format!("server task failed: {}", e))),
            Err(_) => {
                warn!("Live server at {} did not drain in time, aborting", self.addr);
                task.abort();
                Ok(())
            }
        }
    }
}

impl Drop for LiveServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Handle to a running server process
pub struct ServerHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl ServerHandle {
    /// Spawn the superlists-web server
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning web server on port {}", port);

        let mut cmd = Command::new(&config.binary_path);
        cmd.env("SUPERLISTS_WEB_ADDR", format!("127.0.0.1:{}", port));
        match &config.db_path {
            Some(path) => cmd.env("SUPERLISTS_DB_PATH", path),
            None => cmd.env("SUPERLISTS_DB_PATH", ":memory:"),
        };
        if let Some(filter) = &config.log_filter {
            cmd.env("RUST_LOG", filter);
        }

        let stderr = if config.show_logs {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        cmd.stdout(Stdio::null()).stderr(stderr);

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        let mut handle = ServerHandle {
            child,
            base_url: base_url.clone(),
            port,
        };

        if let Err(e) = handle.wait_for_healthy(config.startup_timeout).await {
            let _ = handle.stop();
            return Err(e);
        }

        info!("Server is healthy at {}", base_url);
        Ok(handle)
    }

    /// Wait for the server to respond to health checks
    async fn wait_for_healthy(&mut self, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = format!("{}/health", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            if let Some(status) = self.child.try_wait()? {
                return Err(E2eError::ServerStartup(format!(
                    "server exited during startup: {}",
                    status
                )));
            }

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for server to start...");
                    }
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server
    pub fn stop(&mut self) -> E2eResult<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        info!("Stopping server (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                for _ in 0..10 {
                    if self.child.try_wait()?.is_some() {
                        return Ok(());
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the superlists-web binary
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Database file (None = in-memory store)
    pub db_path: Option<PathBuf>,

    /// Timeout for server startup
    pub startup_timeout: Duration,

    /// `RUST_LOG` for the child process
    pub log_filter: Option<String>,

    /// Forward the server's log output to this process's stderr
    pub show_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("target/debug/superlists-web"),
            port: None,
            db_path: None,
            startup_timeout: Duration::from_secs(30),
            log_filter: None,
            show_logs: false,
        }
    }
}

/// Find a free port to use
pub fn find_free_port() -> E2eResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port = find_free_port().unwrap();
        assert!(port > 0);
    }

    #[tokio::test]
    async fn test_live_server_health_and_stop() {
        let server = LiveServer::start().await.unwrap();
        let url = server.url();
        assert!(url.starts_with("http://127.0.0.1:"));

        let body: serde_json::Value = reqwest::get(format!("{}/health", url))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["service"], "superlists-web");

        server.stop().await.unwrap();
        assert!(reqwest::get(format!("{}/health", url)).await.is_err());
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let config = ServerConfig {
            binary_path: PathBuf::from("/nonexistent/superlists-web"),
            startup_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        assert!(matches!(
            ServerHandle::spawn(config).await,
            Err(E2eError::ServerStartup(_))
        ));
    }
}
