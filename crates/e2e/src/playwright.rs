//! Playwright browser automation over a JSON-lines bridge
//!
//! One `node` process hosts a browser and a single page. Requests are
//! written to its stdin as `{"id", "op", ...}` lines and answered on stdout
//! with `{"id", "ok", "value" | "error"}`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hairathome_common::{PageError, PageHandle};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{PageDriver, Viewport, WaitState, WaitUntil};
use crate::error::{E2eError, E2eResult};

const CONFIG_ENV: &str = "HAIRATHOME_BRIDGE_CONFIG";

const BRIDGE_JS: &str = r#"
const readline = require('readline');
const config = JSON.parse(process.env.HAIRATHOME_BRIDGE_CONFIG || '{}');
const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

(async () => {
  const playwright = require('playwright');
  const browser = await playwright[config.browser || 'chromium'].launch({ headless: config.headless !== false });
  const context = await browser.newContext({ viewport: config.viewport });
  const page = await context.newPage();
  page.setDefaultTimeout(config.actionTimeoutMs);
  page.setDefaultNavigationTimeout(config.navigationTimeoutMs);

  const handlers = {
    goto: (m) => page.goto(m.url, { waitUntil: m.waitUntil }).then((r) => (r ? r.status() : null)),
    evaluate: (m) => page.evaluate(m.expression),
    set_viewport: (m) => page.setViewportSize({ width: m.width, height: m.height }),
    click: (m) => page.click(m.selector, { timeout: m.timeoutMs }),
    wait_for_selector: (m) => page.waitForSelector(m.selector, { state: m.state, timeout: m.timeoutMs }).then(() => null),
    reload: (m) => page.reload({ waitUntil: m.waitUntil }).then(() => null),
    screenshot: (m) => page.screenshot({ path: m.path, fullPage: !!m.fullPage }).then(() => null),
    close: () => browser.close(),
  };

  let queue = Promise.resolve();
  const rl = readline.createInterface({ input: process.stdin });
  rl.on('line', (line) => {
    queue = queue.then(async () => {
      let msg;
      try { msg = JSON.parse(line); } catch (error) { return; }
      const handler = handlers[msg.op];
      if (!handler) {
        send({ id: msg.id, ok: false, kind: 'driver', error: 'unknown op: ' + msg.op });
        return;
      }
      try {
        const value = await handler(msg);
        send({ id: msg.id, ok: true, value: value === undefined ? null : value });
      } catch (error) {
        send({ id: msg.id, ok: false, kind: msg.op === 'evaluate' ? 'script' : 'driver', error: String(error && error.message || error) });
      }
      if (msg.op === 'close') process.exit(0);
    });
  });
  rl.on('close', () => browser.close().finally(() => process.exit(0)));

  send({ ready: true, browser: browser.version() });
})().catch((error) => {
  send({ ready: false, error: String(error && error.message || error) });
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for the browser bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,

    /// Node executable
    pub node: PathBuf,

    /// Directory whose `node_modules` provides `playwright`
    pub working_dir: PathBuf,

    /// Upper bound on any single bridge request
    pub command_timeout_secs: u64,

    pub navigation_timeout_ms: u64,
    pub action_timeout_ms: u64,

    /// Initial viewport
    pub viewport: Viewport,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            node: PathBuf::from("node"),
            working_dir: PathBuf::from("."),
            command_timeout_secs: 60,
            navigation_timeout_ms: 30_000,
            action_timeout_ms: 10_000,
            viewport: Viewport::DESKTOP,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Ready {
    ready: bool,
    #[serde(default)]
    browser: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct Bridge {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A live Playwright page
pub struct PlaywrightPage {
    bridge: Mutex<Option<Bridge>>,
    next_id: AtomicU64,
    command_timeout: Duration,
}

impl PlaywrightPage {
    /// Start the bridge and wait until its page is open
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(config)?;

        let bridge_config = json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "viewport": config.viewport,
            "navigationTimeoutMs": config.navigation_timeout_ms,
            "actionTimeoutMs": config.action_timeout_ms,
        });

        info!(
            "Launching {} ({})",
            config.browser.as_str(),
            if config.headless { "headless" } else { "headed" }
        );

        let mut child = TokioCommand::new(&config.node)
            .arg("-e")
            .arg(BRIDGE_JS)
            .env(CONFIG_ENV, bridge_config.to_string())
            .current_dir(&config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Bridge(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let mut stdout = BufReader::new(stdout).lines();
        let command_timeout = Duration::from_secs(config.command_timeout_secs);

        let first = tokio::time::timeout(command_timeout, stdout.next_line())
            .await
            .map_err(|_| E2eError::Bridge("browser did not start in time".to_string()))??
            .ok_or_else(|| E2eError::Bridge("bridge exited before it was ready".to_string()))?;

        let ready: Ready = serde_json::from_str(&first)?;
        if !ready.ready {
            return Err(E2eError::Bridge(
                ready.error.unwrap_or_else(|| "browser failed to start".to_string()),
            ));
        }
        info!("Browser ready: {}", ready.browser.unwrap_or_default());

        Ok(Self {
            bridge: Mutex::new(Some(Bridge {
                child,
                stdin,
                stdout,
            })),
            next_id: AtomicU64::new(1),
            command_timeout,
        })
    }

    /// Check that `playwright` resolves from the working directory
    fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let status = Command::new(&config.node)
            .args(["-e", "require.resolve('playwright')"])
            .current_dir(&config.working_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Send one request and wait for the response with the same id
    async fn request(&self, op: &str, params: Value) -> Result<Value, PageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut message = json!({ "id": id, "op": op });
        if let (Some(target), Value::Object(extra)) = (message.as_object_mut(), params) {
            target.extend(extra);
        }
        let line = format!("{}\n", message);

        let mut guard = self.bridge.lock().await;
        let bridge = guard.as_mut().ok_or(PageError::Closed)?;

        match tokio::time::timeout(self.command_timeout, bridge.exchange(id, &line)).await {
            Ok(result) => result,
            Err(_) => Err(PageError::Timeout {
                ms: self.command_timeout.as_millis() as u64,
            }),
        }
    }
}

impl Bridge {
    async fn exchange(&mut self, id: u64, line: &str) -> Result<Value, PageError> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PageError::Driver(e.to_string()))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| PageError::Driver(e.to_string()))?;

        loop {
            let reply = self
                .stdout
                .next_line()
                .await
                .map_err(|e| PageError::Driver(e.to_string()))?
                .ok_or(PageError::Closed)?;

            let response: Response = match serde_json::from_str(&reply) {
                Ok(r) => r,
                Err(_) => {
                    debug!(target: "playwright", "{}", reply);
                    continue;
                }
            };
            if response.id != id {
                // Late answer to a request that already timed out
                debug!("Discarding response {} while waiting for {}", response.id, id);
                continue;
            }
            return response.into_result();
        }
    }
}

impl Response {
    fn into_result(self) -> Result<Value, PageError> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unknown error".to_string());
        match self.kind.as_deref() {
            Some("script") => Err(PageError::Script(message)),
            _ => Err(PageError::Driver(message)),
        }
    }
}

#[async_trait]
impl PageHandle for PlaywrightPage {
    async fn evaluate(&self, expression: &str) -> Result<Value, PageError> {
        self.request("evaluate", json!({ "expression": expression })).await
    }
}

#[async_trait]
impl PageDriver for PlaywrightPage {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), PageError> {
        debug!("goto {}", url);
        let status = self
            .request("goto", json!({ "url": url, "waitUntil": wait_until.as_str() }))
            .await?;
        match status.as_u64() {
            Some(code) if code >= 400 => {
                Err(PageError::Driver(format!("{} returned HTTP {}", url, code)))
            }
            _ => Ok(()),
        }
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), PageError> {
        self.request(
            "set_viewport",
            json!({ "width": viewport.width, "height": viewport.height }),
        )
        .await
        .map(|_| ())
    }

    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<(), PageError> {
        self.request("click", json!({ "selector": selector, "timeoutMs": timeout_ms }))
            .await
            .map(|_| ())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout_ms: u64,
    ) -> Result<(), PageError> {
        self.request(
            "wait_for_selector",
            json!({ "selector": selector, "state": state.as_str(), "timeoutMs": timeout_ms }),
        )
        .await
        .map(|_| ())
    }

    async fn reload(&self, wait_until: WaitUntil) -> Result<(), PageError> {
        self.request("reload", json!({ "waitUntil": wait_until.as_str() }))
            .await
            .map(|_| ())
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), PageError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| PageError::Driver(e.to_string()))?
                .join(path)
        };
        self.request(
            "screenshot",
            json!({ "path": path.to_string_lossy(), "fullPage": full_page }),
        )
        .await
        .map(|_| ())
    }

    async fn close(&self) -> Result<(), PageError> {
        let result = self.request("close", json!({})).await;

        let mut guard = self.bridge.lock().await;
        if let Some(mut bridge) = guard.take() {
            drop(bridge.stdin);
            match tokio::time::timeout(Duration::from_secs(5), bridge.child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("Browser bridge did not exit, killing it");
                    let _ = bridge.child.kill().await;
                }
            }
        }

        match result {
            Ok(_) | Err(PageError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_from_str() {
        assert_eq!("Chromium".parse::<Browser>().unwrap(), Browser::Chromium);
        assert_eq!("safari".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("netscape".parse::<Browser>().is_err());
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: PlaywrightConfig = toml::from_str("browser = \"firefox\"\nheadless = false\n").unwrap();
        assert_eq!(config.browser, Browser::Firefox);
        assert!(!config.headless);
        assert_eq!(config.viewport, Viewport::DESKTOP);
        assert_eq!(config.command_timeout_secs, 60);
    }

    #[test]
    fn test_response_error_kinds() {
        let script: Response =
            serde_json::from_str(r#"{"id":1,"ok":false,"kind":"script","error":"x is not defined"}"#)
                .unwrap();
        assert_eq!(
            script.into_result(),
            Err(PageError::Script("x is not defined".to_string()))
        );

        let driver: Response =
            serde_json::from_str(r#"{"id":2,"ok":false,"error":"Timeout 5000ms exceeded"}"#).unwrap();
        assert!(matches!(driver.into_result(), Err(PageError::Driver(_))));

        let ok: Response = serde_json::from_str(r#"{"id":3,"ok":true,"value":"Hair@Home"}"#).unwrap();
        assert_eq!(ok.into_result(), Ok(json!("Hair@Home")));
    }

    #[test]
    fn test_missing_node_reports_playwright_not_found() {
        let config = PlaywrightConfig {
            node: PathBuf::from("hairathome-no-such-node"),
            ..PlaywrightConfig::default()
        };
        assert!(matches!(
            PlaywrightPage::check_playwright_installed(&config),
            Err(E2eError::PlaywrightNotFound)
        ));
    }
}
