//! Site server management - spawning `hugo server` and waiting for it to answer

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// How to bring up the site under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Spawn a server at all; when false the configured base URL is used as is
    pub enabled: bool,

    pub command: String,

    /// Arguments before the bind/port/baseURL flags the runner appends
    pub args: Vec<String>,

    /// Hugo project root
    pub site_dir: PathBuf,

    /// Port to listen on (None = find a free port)
    pub port: Option<u16>,

    /// Path the site is served under, matching its `baseURL`
    pub base_path: String,

    pub startup_timeout_secs: u64,

    /// Use a server that already answers on the port instead of spawning one
    pub reuse_existing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "hugo".to_string(),
            args: vec!["server".to_string(), "-D".to_string()],
            site_dir: PathBuf::from("."),
            port: Some(1313),
            base_path: "/hairathome/".to_string(),
            startup_timeout_secs: 120,
            reuse_existing: true,
        }
    }
}

/// A running (or reused) site server
pub struct SiteServer {
    child: Option<Child>,
    base_url: String,
}

impl SiteServer {
    /// Start the server, or attach to one already answering
    pub async fn start(config: &ServerConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = site_url(port, &config.base_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        if config.reuse_existing && responds(&client, &base_url).await {
            info!("Reusing site server already running at {}", base_url);
            return Ok(Self {
                child: None,
                base_url,
            });
        }

        info!("Starting {} on port {}", config.command, port);

        let child = Command::new(&config.command)
            .args(&config.args)
            .arg("--bind")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .arg("--baseURL")
            .arg(&base_url)
            .current_dir(&config.site_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                E2eError::ServerStartup(format!("failed to spawn {}: {}", config.command, e))
            })?;

        let mut server = Self {
            child: Some(child),
            base_url,
        };
        server
            .wait_for_healthy(&client, Duration::from_secs(config.startup_timeout_secs))
            .await?;

        info!("Site is up at {}", server.base_url);
        Ok(server)
    }

    async fn wait_for_healthy(
        &mut self,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> E2eResult<()> {
        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(E2eError::ServerStartup(format!(
                        "server exited during startup with {}",
                        status
                    )));
                }
            }

            match client.get(&self.base_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!("Site returned {}", resp.status()),
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for site to build...");
                    }
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(250)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server if we started it
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping site server (pid: {})", child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = child.kill();
        child.wait()?;
        Ok(())
    }
}

impl Drop for SiteServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

async fn responds(client: &reqwest::Client, url: &str) -> bool {
    matches!(client.get(url).send().await, Ok(resp) if resp.status().is_success())
}

/// Site root for a local server, always ending in `/`
pub fn site_url(port: u16, base_path: &str) -> String {
    let path = base_path.trim_matches('/');
    if path.is_empty() {
        format!("http://127.0.0.1:{}/", port)
    } else {
        format!("http://127.0.0.1:{}/{}/", port, path)
    }
}

fn find_free_port() -> E2eResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port = find_free_port().unwrap();
        assert!(port > 1024);
    }

    #[test]
    fn test_site_url() {
        assert_eq!(site_url(1313, "/hairathome/"), "http://127.0.0.1:1313/hairathome/");
        assert_eq!(site_url(1313, "hairathome"), "http://127.0.0.1:1313/hairathome/");
        assert_eq!(site_url(8080, "/"), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_default_config_matches_hugo_dev_server() {
        let config = ServerConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.port, Some(1313));
        assert_eq!(config.args, vec!["server", "-D"]);
    }

    #[tokio::test]
    async fn test_missing_command_fails_startup() {
        let config = ServerConfig {
            command: "hairathome-no-such-binary".to_string(),
            port: None,
            reuse_existing: false,
            ..ServerConfig::default()
        };
        let err = SiteServer::start(&config).await.err().unwrap();
        assert!(matches!(err, E2eError::ServerStartup(_)));
    }
}
