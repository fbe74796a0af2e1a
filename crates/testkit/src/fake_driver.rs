//! Scripted Playwright driver simulating the login screen

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};

/// Error text rendered after a failed login
pub const LOGIN_ERROR_TEXT: &str = "The username and password could not be verified.";

const USERNAME_FIELD: &str = r#"input[name="username"]"#;
const PASSWORD_FIELD: &str = r#"input[name="password"]"#;
const SUBMIT_BUTTON: &str = r#"input[value="Log In"]"#;
const ERROR_REGION: &str = "#rightPanel .error";
const LOGGED_IN_MARKER: &str = "text=Accounts Overview";

#[derive(Default)]
struct PageState {
    url: Option<String>,
    fields: HashMap<String, String>,
    logged_in: bool,
    error_shown: bool,
    closed: bool,
}

/// Inspection handle for a fake driver; the task ends with its pipe
#[derive(Clone)]
pub struct FakeLoginPage {
    requests: Arc<Mutex<Vec<Value>>>,
    state: Arc<Mutex<PageState>>,
}

impl FakeLoginPage {
    /// Start a driver accepting `username`/`password`
    ///
    /// Returns the client end of the pipe and the inspection handle.
    pub fn spawn(username: &str, password: &str) -> (DuplexStream, Self) {
        Self::spawn_with(Some((username.to_string(), password.to_string())), None)
    }

    /// Start a driver whose browser launch fails with `error`
    pub fn spawn_broken(error: &str) -> (DuplexStream, Self) {
        Self::spawn_with(None, Some(error.to_string()))
    }

    fn spawn_with(
        valid: Option<(String, String)>,
        launch_error: Option<String>,
    ) -> (DuplexStream, Self) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(Mutex::new(PageState::default()));

        tokio::spawn(serve(
            server,
            valid,
            launch_error,
            requests.clone(),
            state.clone(),
        ));

        (
            client,
            Self { requests, state },
        )
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }

    /// The `op` of every request received, in order
    pub fn ops(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r.get("op").and_then(Value::as_str).map(String::from))
            .collect()
    }

    pub fn current_url(&self) -> Option<String> {
        self.state.lock().url.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().logged_in
    }

    pub fn was_closed(&self) -> bool {
        self.state.lock().closed
    }
}

async fn serve(
    stream: DuplexStream,
    valid: Option<(String, String)>,
    launch_error: Option<String>,
    requests: Arc<Mutex<Vec<Value>>>,
    state: Arc<Mutex<PageState>>,
) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    let hello = match &launch_error {
        Some(error) => json!({ "ready": false, "error": error }),
        None => json!({ "ready": true }),
    };
    if write_line(&mut writer, &hello).await.is_err() || launch_error.is_some() {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(request) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        requests.lock().push(request.clone());

        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let op = request.get("op").and_then(Value::as_str).unwrap_or_default();
        let outcome = {
            let mut page = state.lock();
            apply(&mut page, op, &request, valid.as_ref())
        };

        let reply = match outcome {
            Ok(()) => json!({ "id": id, "ok": true }),
            Err(error) => json!({ "id": id, "ok": false, "error": error }),
        };
        if write_line(&mut writer, &reply).await.is_err() || op == "close" {
            break;
        }
    }
}

async fn write_line<W>(writer: &mut W, value: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(value.to_string().as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn apply(
    page: &mut PageState,
    op: &str,
    request: &Value,
    valid: Option<&(String, String)>,
) -> Result<(), String> {
    let field = |name: &str| {
        request
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let timeout_ms = request
        .get("timeout_ms")
        .and_then(Value::as_u64)
        .unwrap_or(5000);
    let timed_out =
        |selector: &str| format!("Timeout {}ms exceeded waiting for '{}'", timeout_ms, selector);

    match op {
        "goto" => {
            page.url = Some(field("url"));
            page.fields.clear();
            page.logged_in = false;
            page.error_shown = false;
            Ok(())
        }
        "fill" => {
            let selector = field("selector");
            if page.url.is_none() {
                return Err(timed_out(&selector));
            }
            if selector != USERNAME_FIELD && selector != PASSWORD_FIELD {
                return Err(timed_out(&selector));
            }
            page.fields.insert(selector, field("value"));
            Ok(())
        }
        "click" => {
            let selector = field("selector");
            if page.url.is_none() || selector != SUBMIT_BUTTON {
                return Err(timed_out(&selector));
            }
            let username = page.fields.get(USERNAME_FIELD).cloned().unwrap_or_default();
            let password = page.fields.get(PASSWORD_FIELD).cloned().unwrap_or_default();
            let accepted = valid.map_or(false, |(u, p)| *u == username && *p == password);
            page.logged_in = accepted;
            page.error_shown = !accepted;
            Ok(())
        }
        "expect_visible" => {
            let selector = field("selector");
            let visible = (selector == LOGGED_IN_MARKER && page.logged_in)
                || (selector == ERROR_REGION && page.error_shown);
            if visible {
                Ok(())
            } else {
                Err(timed_out(&selector))
            }
        }
        "expect_text" => {
            let selector = field("selector");
            let expected = field("text");
            let actual = if selector == ERROR_REGION && page.error_shown {
                LOGIN_ERROR_TEXT
            } else if selector == LOGGED_IN_MARKER && page.logged_in {
                "Accounts Overview"
            } else {
                return Err(timed_out(&selector));
            };
            if actual.contains(&expected) {
                Ok(())
            } else {
                Err(format!(
                    "expected text containing \"{}\", got \"{}\"",
                    expected, actual
                ))
            }
        }
        "screenshot" => Ok(()),
        "close" => {
            page.closed = true;
            Ok(())
        }
        other => Err(format!("unknown op: {}", other)),
    }
}
