//! Playwright browser automation
//!
//! The browser lives in a `node` child process running [`DRIVER_SCRIPT`].
//! The driver opens one browser, one context and one page, prints
//! `{"ready":true}`, then executes one JSON command per stdin line and
//! answers each with `{"id":n,"ok":bool,"error"?:string}` on stdout.
//! Auto-waiting is left to Playwright itself.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use bookcheck_common::{BrowserConfig, BrowserKind};

use crate::error::{E2eError, E2eResult};

/// Environment variable carrying [`DriverOptions`] to the driver
pub const DRIVER_OPTIONS_ENV: &str = "BOOKCHECK_DRIVER_OPTIONS";

/// How long a closing driver may take before it is signalled
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Node side of the protocol
pub const DRIVER_SCRIPT: &str = r##"
const path = require('path');
const readline = require('readline');
const { createRequire } = require('module');

const opts = JSON.parse(process.env.BOOKCHECK_DRIVER_OPTIONS || '{}');
const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

async function expectText(locator, text, timeout) {
  const deadline = Date.now() + timeout;
  let last = '';
  for (;;) {
    const remaining = Math.max(1, deadline - Date.now());
    try {
      last = await locator.first().innerText({ timeout: remaining });
    } catch (err) {
      if (Date.now() >= deadline) throw err;
    }
    if (last.includes(text)) return;
    if (Date.now() >= deadline) {
      throw new Error(`expected text containing "${text}", got "${last}"`);
    }
    await new Promise((r) => setTimeout(r, 100));
  }
}

(async () => {
  const playwright = createRequire(path.join(process.cwd(), 'package.json'))('playwright');
  const browser = await playwright[opts.browser || 'chromium'].launch({
    headless: opts.headless !== false,
    slowMo: opts.slowMo || 0,
  });
  const context = await browser.newContext();
  const page = await context.newPage();
  page.setDefaultTimeout(opts.actionTimeout || 30000);
  reply({ ready: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req = {};
    try {
      req = JSON.parse(line);
      switch (req.op) {
        case 'goto': await page.goto(req.url); break;
        case 'fill': await page.fill(req.selector, req.value); break;
        case 'click': await page.click(req.selector); break;
        case 'expect_visible':
          await page.locator(req.selector).first().waitFor({ state: 'visible', timeout: req.timeout_ms });
          break;
        case 'expect_text':
          await expectText(page.locator(req.selector), req.text, req.timeout_ms);
          break;
        case 'screenshot': await page.screenshot({ path: req.path, fullPage: true }); break;
        case 'close':
          await page.close();
          await browser.close();
          reply({ id: req.id, ok: true });
          rl.close();
          return;
        default: throw new Error(`unknown op: ${req.op}`);
      }
      reply({ id: req.id, ok: true });
    } catch (err) {
      reply({ id: req.id ?? null, ok: false, error: err.message });
    }
  }
  await browser.close();
})().catch((err) => {
  reply({ ready: false, error: err.message });
  process.exit(1);
});
"##;

/// Launch options handed to the driver
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverOptions {
    pub browser: BrowserKind,
    pub headless: bool,
    pub slow_mo: u64,
    pub action_timeout: u64,
}

impl From<&BrowserConfig> for DriverOptions {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            browser: config.kind,
            headless: config.headless,
            slow_mo: config.slow_mo_ms,
            action_timeout: config.launch_timeout.as_millis() as u64,
        }
    }
}

/// One driver command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Goto { url: String },
    Fill { selector: String, value: String },
    Click { selector: String },
    ExpectVisible { selector: String, timeout_ms: u64 },
    ExpectText { selector: String, text: String, timeout_ms: u64 },
    Screenshot { path: String },
    Close,
}

impl Command {
    /// Short label for logs
    pub fn name(&self) -> String {
        match self {
            Command::Goto { url } => format!("goto:{}", url),
            Command::Fill { selector, .. } => format!("fill:{}", selector),
            Command::Click { selector } => format!("click:{}", selector),
            Command::ExpectVisible { selector, .. } => format!("expect_visible:{}", selector),
            Command::ExpectText { selector, .. } => format!("expect_text:{}", selector),
            Command::Screenshot { path } => format!("screenshot:{}", path),
            Command::Close => "close".to_string(),
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a Command,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

type DriverReader = Box<dyn AsyncRead + Send + Unpin>;
type DriverWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Connection {
    writer: DriverWriter,
    lines: Lines<BufReader<DriverReader>>,
    next_id: u64,
}

/// A browser page behind a running driver
pub struct Page {
    conn: Mutex<Connection>,
    child: Option<Child>,
    _script_dir: Option<TempDir>,
    expect_timeout: Duration,
}

impl Page {
    /// Launch a fresh browser and page
    pub async fn launch(config: &BrowserConfig) -> E2eResult<Self> {
        check_playwright_installed(&config.driver_dir).await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bookcheck-driver.js");
        std::fs::write(&script_path, DRIVER_SCRIPT)?;
        let options = serde_json::to_string(&DriverOptions::from(config))?;

        info!(
            "Launching {} (headless: {})",
            config.kind.as_str(),
            config.headless
        );

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(&config.driver_dir)
            .env(DRIVER_OPTIONS_ENV, options)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::BrowserLaunch(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Protocol("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Protocol("driver stdout unavailable".to_string()))?;

        let mut page = Self::with_transport(Box::new(stdout), Box::new(stdin), config.expect_timeout);
        page.child = Some(child);
        page._script_dir = Some(script_dir);

        match timeout(config.launch_timeout, page.wait_ready()).await {
            Ok(Ok(())) => Ok(page),
            Ok(Err(e)) => {
                page.shutdown().await;
                Err(e)
            }
            Err(_) => {
                page.shutdown().await;
                Err(E2eError::Timeout("browser launch".to_string()))
            }
        }
    }

    /// Attach to a driver that is already running on the given streams
    pub async fn attach<R, W>(reader: R, writer: W, expect_timeout: Duration) -> E2eResult<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let page = Self::with_transport(Box::new(reader), Box::new(writer), expect_timeout);
        page.wait_ready().await?;
        Ok(page)
    }

    fn with_transport(reader: DriverReader, writer: DriverWriter, expect_timeout: Duration) -> Self {
        Self {
            conn: Mutex::new(Connection {
                writer,
                lines: BufReader::new(reader).lines(),
                next_id: 0,
            }),
            child: None,
            _script_dir: None,
            expect_timeout,
        }
    }

    async fn wait_ready(&self) -> E2eResult<()> {
        let mut conn = self.conn.lock().await;
        let line = conn.lines.next_line().await?.ok_or_else(|| {
            E2eError::BrowserLaunch("driver exited before the page opened".to_string())
        })?;
        let reply: Reply = serde_json::from_str(&line)?;
        match reply.ready {
            Some(true) => Ok(()),
            _ => Err(E2eError::BrowserLaunch(
                reply
                    .error
                    .unwrap_or_else(|| "driver did not report ready".to_string()),
            )),
        }
    }

    /// Send one command and wait for its reply
    pub async fn send(&self, command: Command) -> E2eResult<()> {
        let mut conn = self.conn.lock().await;
        conn.next_id += 1;
        let id = conn.next_id;

        let mut line = serde_json::to_string(&Request {
            id,
            command: &command,
        })?;
        line.push('\n');

        debug!("-> [{}] {}", id, command.name());
        conn.writer.write_all(line.as_bytes()).await?;
        conn.writer.flush().await?;

        // replies to commands abandoned by a timed-out step are still queued
        let reply = loop {
            let raw = conn
                .lines
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Protocol("driver closed the connection".to_string()))?;
            let reply: Reply = serde_json::from_str(&raw)?;
            match reply.id {
                Some(got) if got < id => debug!("Discarding stale reply to {}", got),
                Some(got) if got == id => break reply,
                other => {
                    return Err(E2eError::Protocol(format!(
                        "expected reply to {}, got {:?}",
                        id, other
                    )))
                }
            }
        };
        if reply.ok {
            Ok(())
        } else {
            Err(E2eError::Playwright(reply.error.unwrap_or_else(|| {
                format!("{} failed without a message", command.name())
            })))
        }
    }

    pub async fn goto(&self, url: &str) -> E2eResult<()> {
        self.send(Command::Goto {
            url: url.to_string(),
        })
        .await
    }

    pub async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.send(Command::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        })
        .await
    }

    pub async fn click(&self, selector: &str) -> E2eResult<()> {
        self.send(Command::Click {
            selector: selector.to_string(),
        })
        .await
    }

    pub fn locator(&self, selector: &str) -> Locator<'_> {
        Locator {
            page: self,
            selector: selector.to_string(),
        }
    }

    pub async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        self.send(Command::Screenshot {
            path: path.to_string_lossy().into_owned(),
        })
        .await
    }

    /// Close the page and browser, then reap the driver
    pub async fn close(mut self) -> E2eResult<()> {
        let result = match timeout(CLOSE_GRACE, self.send(Command::Close)).await {
            Ok(result) => result,
            Err(_) => Err(E2eError::Timeout("driver close".to_string())),
        };
        if let Err(e) = &result {
            warn!("Driver close failed: {}", e);
        }
        self.shutdown().await;
        result
    }

    async fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if timeout(CLOSE_GRACE, child.wait()).await.is_ok() {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && timeout(Duration::from_millis(500), child.wait()).await.is_ok()
            {
                return;
            }
        }

        warn!("Driver did not exit, killing it");
        let _ = child.kill().await;
    }
}

/// A selector bound to a page; expectations auto-wait
pub struct Locator<'p> {
    page: &'p Page,
    selector: String,
}

impl Locator<'_> {
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Wait until the first match is visible
    pub async fn expect_visible(&self) -> E2eResult<()> {
        self.page
            .send(Command::ExpectVisible {
                selector: self.selector.clone(),
                timeout_ms: self.timeout_ms(),
            })
            .await
    }

    /// Wait until the first match's text contains `text`
    pub async fn expect_contains_text(&self, text: &str) -> E2eResult<()> {
        self.page
            .send(Command::ExpectText {
                selector: self.selector.clone(),
                text: text.to_string(),
                timeout_ms: self.timeout_ms(),
            })
            .await
    }

    fn timeout_ms(&self) -> u64 {
        self.page.expect_timeout.as_millis() as u64
    }
}

/// Check that `npx playwright` resolves from `dir`
async fn check_playwright_installed(dir: &Path) -> E2eResult<()> {
    let status = TokioCommand::new("npx")
        .args(["--no-install", "playwright", "--version"])
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn wire(id: u64, command: &Command) -> Value {
        serde_json::to_value(Request { id, command }).unwrap()
    }

    #[test]
    fn test_command_wire_format() {
        assert_eq!(
            wire(
                3,
                &Command::Fill {
                    selector: r#"input[name="username"]"#.to_string(),
                    value: "john".to_string(),
                }
            ),
            json!({"id": 3, "op": "fill", "selector": "input[name=\"username\"]", "value": "john"})
        );
        assert_eq!(wire(9, &Command::Close), json!({"id": 9, "op": "close"}));
        assert_eq!(
            wire(
                1,
                &Command::ExpectText {
                    selector: "#rightPanel .error".to_string(),
                    text: "could not be verified".to_string(),
                    timeout_ms: 5000,
                }
            ),
            json!({
                "id": 1,
                "op": "expect_text",
                "selector": "#rightPanel .error",
                "text": "could not be verified",
                "timeout_ms": 5000
            })
        );
    }

    #[test]
    fn test_driver_options_follow_config() {
        let config = BrowserConfig::default().with_headless(false);
        let options = serde_json::to_value(DriverOptions::from(&config)).unwrap();
        assert_eq!(options["browser"], "chromium");
        assert_eq!(options["headless"], false);
        assert_eq!(options["slowMo"], 100);
        assert_eq!(options["actionTimeout"], 30000);
    }

    #[test]
    fn test_driver_script_handles_every_command() {
        for op in [
            "'goto'",
            "'fill'",
            "'click'",
            "'expect_visible'",
            "'expect_text'",
            "'screenshot'",
            "'close'",
        ] {
            assert!(DRIVER_SCRIPT.contains(op), "driver script lacks {}", op);
        }
        assert!(DRIVER_SCRIPT.contains(DRIVER_OPTIONS_ENV));
    }

    #[test]
    fn test_malformed_lines_are_answered_not_fatal() {
        let body = &DRIVER_SCRIPT[DRIVER_SCRIPT.find("for await").unwrap()..];
        let guarded = body.find("try {").unwrap();
        let parsed = body.find("JSON.parse(line)").unwrap();
        assert!(guarded < parsed, "command parsing must happen inside the try block");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_gives_up_on_silent_driver() {
        let (client, mut driver) = tokio::io::duplex(4096);
        driver.write_all(b"{\"ready\":true}\n").await.unwrap();
        let (reader, writer) = tokio::io::split(client);
        let page = Page::attach(reader, writer, Duration::from_secs(1))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let result = timeout(CLOSE_GRACE * 3, page.close())
            .await
            .expect("close must not wait for a reply forever");

        assert!(matches!(result, Err(E2eError::Timeout(_))));
        assert!(started.elapsed() >= CLOSE_GRACE);
        drop(driver);
    }

    #[test]
    fn test_reply_parsing() {
        let reply: Reply = serde_json::from_str(r#"{"ready":true}"#).unwrap();
        assert_eq!(reply.ready, Some(true));
        assert!(!reply.ok);

        let reply: Reply =
            serde_json::from_str(r#"{"id":4,"ok":false,"error":"Timeout 5000ms exceeded"}"#)
                .unwrap();
        assert_eq!(reply.id, Some(4));
        assert_eq!(reply.error.as_deref(), Some("Timeout 5000ms exceeded"));
    }
}
