//! Site server management - spawning and health checking the static-site
//! server for the duration of a run
//!
//! The server process is a scoped resource: spawned before the first check,
//! terminated on every exit path (SIGTERM first on unix, then kill, with
//! `Drop` as the backstop). When no serve command is configured the base URL
//! is probed once and assumed to be a live deployment.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{join_url, ServerSpec};
use crate::error::ServerError;

/// Handle to a running site server process
pub struct ServerHandle {
    child: Child,
    base_url: String,
}

impl ServerHandle {
    /// Spawn the configured serve command and wait for it to become healthy
    pub async fn spawn(spec: &ServerSpec, base_url: &str) -> Result<Self, ServerError> {
        let (program, args) = spec
            .command
            .split_first()
            .ok_or_else(|| ServerError::Startup("server command is empty".to_string()))?;

        info!("Spawning site server: {}", spec.command.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ServerError::Startup(format!("failed to spawn {program}: {e}")))?;

        let handle = ServerHandle {
            child,
            base_url: base_url.trim_end_matches('/').to_string(),
        };

        handle
            .wait_for_healthy(
                &spec.health_path,
                Duration::from_secs(spec.startup_timeout_secs),
            )
            .await?;

        info!("Site server is healthy at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the health URL until it answers 2xx or the timeout elapses
    async fn wait_for_healthy(
        &self,
        health_path: &str,
        timeout_duration: Duration,
    ) -> Result<(), ServerError> {
        let health_url = join_url(&self.base_url, health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for site server to start...");
                    }
                    // Connection refused is expected while the server starts
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(ServerError::HealthCheck {
            url: health_url,
            attempts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server process
    pub fn stop(&mut self) -> Result<(), ServerError> {
        info!("Stopping site server (pid: {})", self.child.id());

        // Graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
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

/// Probe a live base URL once when no serve command is configured
pub async fn probe_base_url(base_url: &str) -> Result<(), ServerError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let resp = client.get(base_url).send().await?;
    if resp.status().is_success() || resp.status().is_redirection() {
        Ok(())
    } else {
        Err(ServerError::Startup(format!(
            "base URL {} answered {}",
            base_url,
            resp.status()
        )))
    }
}
