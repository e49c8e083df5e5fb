//! Drives an external compiler over a JSON-lines session.
//!
//! The child process is started on first use and kept for the life of the
//! adapter, so an import cache inside the compiler is shared by every call on
//! the same handle. Each call writes one request line on stdin, then reads
//! stdout lines until the response line:
//!
//! ```text
//! -> {"op":"compile","source":"body { foo: add(4, 3) }","options":{"compress":true,...}}
//! <- {"call":"add","args":[{"type":"unit","value":4.0,"unit":null},{"type":"unit","value":3.0,"unit":null}]}
//! -> {"result":{"type":"unit","value":7.0,"unit":null}}
//! <- {"ok":true,"css":"body{foo:7}"}
//! ```
//!
//! A `call` line invokes a native function listed in the request options
//! (`{"kind":"native"}`); the harness answers with `result` or `error`. A
//! failed compile answers `{"ok":false,"error":"..."}`. Blank lines are
//! skipped. Plugins run on the harness side before serialization, so only
//! their resulting definitions travel.
//!
//! The child is killed when a call is dropped before its response arrives
//! (a case timeout, for instance) or when the stream stops making sense. The
//! next call starts a fresh child.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CompileOutput, SourceMapDocument, SystemUnderTest};
use crate::configuration::{Builtin, Configuration, Function, Node, SourceMapOptions};
use crate::AdapterError;

/// How long [`ProcessAdapter::shutdown`] waits for the child to exit on EOF.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Operation {
    Compile,
    Convert,
    Deps,
    Sourcemap,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WireFunction {
    Builtin { builtin: Builtin },
    Native,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOptions {
    compress: bool,
    include_css: bool,
    prefix: Option<String>,
    hoist_atrules: bool,
    resolve_url: bool,
    sourcemap: Option<SourceMapOptions>,
    filename: Option<PathBuf>,
    paths: Vec<PathBuf>,
    globals: BTreeMap<String, Node>,
    functions: BTreeMap<String, WireFunction>,
}

/// Expects a configuration with plugins already applied.
impl From<&Configuration> for WireOptions {
    fn from(config: &Configuration) -> Self {
        Self {
            compress: config.compress,
            include_css: config.include_css,
            prefix: config.prefix.clone(),
            hoist_atrules: config.hoist_atrules,
            resolve_url: config.resolve_url,
            sourcemap: config.sourcemap.clone(),
            filename: config.filename.clone(),
            paths: config.include_paths.clone(),
            globals: config
                .globals
                .iter()
                .map(|(name, definition)| (name.clone(), definition.to_node()))
                .collect(),
            functions: config
                .functions
                .iter()
                .map(|(name, function)| {
                    let wire = match function {
                        Function::Builtin(builtin) => WireFunction::Builtin { builtin: *builtin },
                        Function::Native(_) => WireFunction::Native,
                    };
                    (name.clone(), wire)
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    op: Operation,
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<WireOptions>,
}

#[derive(Debug, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    css: Option<String>,
    #[serde(default)]
    styl: Option<String>,
    #[serde(default)]
    deps: Option<Vec<PathBuf>>,
    #[serde(default)]
    map: Option<Value>,
}

impl Response {
    fn field<T>(value: Option<T>, name: &str) -> Result<T, AdapterError> {
        value.ok_or_else(|| AdapterError::Protocol(format!("response is missing '{name}'")))
    }

    fn into_result(self) -> Result<Self, AdapterError> {
        if self.ok {
            return Ok(self);
        }
        Err(AdapterError::Compile(
            self.error
                .unwrap_or_else(|| "compiler reported failure without a message".to_string()),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    call: String,
    #[serde(default)]
    args: Vec<Node>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Incoming {
    Call(FunctionCall),
    Response(Response),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CallReply {
    Result(Node),
    Error(String),
}

impl CallReply {
    fn answer(call: FunctionCall, functions: Option<&BTreeMap<String, Function>>) -> Self {
        match functions.and_then(|functions| functions.get(&call.call)) {
            Some(Function::Native(function)) => match function.call(&call.args) {
                Ok(node) => CallReply::Result(node),
                Err(message) => CallReply::Error(message),
            },
            Some(Function::Builtin(builtin)) => CallReply::Error(format!(
                "'{}' is bound to the {builtin:?} builtin, which the compiler evaluates",
                call.call
            )),
            None => CallReply::Error(format!("no function named '{}'", call.call)),
        }
    }
}

/// A running child with its pipes.
#[derive(Debug)]
struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Session {
    fn spawn(adapter: &ProcessAdapter) -> Result<Self, AdapterError> {
        let mut command = Command::new(&adapter.program);
        command
            .args(&adapter.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        let mut child = command.spawn()?;
        debug!(program = %adapter.program.display(), pid = ?child.id(), "started compiler");

        let missing = |pipe: &str| AdapterError::Protocol(format!("compiler {pipe} is not piped"));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn write_line(&mut self, line: &str) -> Result<(), AdapterError> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Sends one request and serves function calls until the response line.
    /// Any error leaves the stream in an unknown state.
    async fn exchange(
        &mut self,
        payload: &str,
        functions: Option<&BTreeMap<String, Function>>,
    ) -> Result<Response, AdapterError> {
        self.write_line(payload).await?;
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                let status = self.child.try_wait()?;
                return Err(AdapterError::Protocol(match status {
                    Some(status) => format!("compiler exited before answering ({status})"),
                    None => "compiler closed stdout before answering".to_string(),
                }));
            };
            if line.trim().is_empty() {
                continue;
            }
            let incoming: Incoming = serde_json::from_str(&line)
                .map_err(|e| AdapterError::Protocol(format!("{e}: {line}")))?;
            match incoming {
                Incoming::Response(response) => return Ok(response),
                Incoming::Call(call) => {
                    debug!(function = %call.call, args = call.args.len(), "compiler called back");
                    let reply = CallReply::answer(call, functions);
                    let reply = serde_json::to_string(&reply)
                        .map_err(|e| AdapterError::Protocol(format!("cannot encode reply: {e}")))?;
                    self.write_line(&reply).await?;
                }
            }
        }
    }
}

/// A compiler reachable as a long-running command line program.
#[derive(Debug)]
pub struct ProcessAdapter {
    program: PathBuf,
    args: Vec<String>,
    session: Mutex<Option<Session>>,
}

impl ProcessAdapter {
    /// `command[0]` is the program, the rest its arguments. Nothing is
    /// spawned until the first call.
    pub fn new<S: AsRef<str>>(command: &[S]) -> Result<Self, AdapterError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| AdapterError::Unsupported("empty compiler command".to_string()))?;
        Ok(Self {
            program: PathBuf::from(program.as_ref()),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            session: Mutex::new(None),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Closes the child's stdin and waits briefly for it to exit, killing it
    /// otherwise. A later call starts a new child.
    pub async fn shutdown(&self) -> Result<(), AdapterError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };
        let Session { mut child, stdin, .. } = session;
        drop(stdin);
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(status) => debug!(status = %status?, "compiler exited"),
            Err(_) => {
                warn!(program = %self.program.display(), "compiler ignored EOF; killing");
                child.kill().await?;
            }
        }
        Ok(())
    }

    async fn call(
        &self,
        op: Operation,
        source: &str,
        config: Option<&Configuration>,
    ) -> Result<Response, AdapterError> {
        let config = config.map(Configuration::with_plugins_applied);
        let request = Request {
            op,
            source,
            options: config.as_ref().map(WireOptions::from),
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| AdapterError::Protocol(format!("cannot encode request: {e}")))?;

        let mut slot = self.session.lock().await;
        let mut session = match slot.take() {
            Some(session) => session,
            None => Session::spawn(self)?,
        };
        debug!(op = ?op, bytes = payload.len(), "sending request");
        // On error or cancellation `session` is dropped here, killing the child.
        let response = session
            .exchange(&payload, config.as_ref().map(|c| &c.functions))
            .await?;
        *slot = Some(session);
        response.into_result()
    }
}

#[async_trait]
impl SystemUnderTest for ProcessAdapter {
    async fn compile(&self, source: &str, config: &Configuration) -> Result<String, AdapterError> {
        let response = self.call(Operation::Compile, source, Some(config)).await?;
        Response::field(response.css, "css")
    }

    async fn convert(&self, css: &str) -> Result<String, AdapterError> {
        let response = self.call(Operation::Convert, css, None).await?;
        Response::field(response.styl, "styl")
    }

    async fn dependencies(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<Vec<PathBuf>, AdapterError> {
        let response = self.call(Operation::Deps, source, Some(config)).await?;
        Response::field(response.deps, "deps")
    }

    async fn compile_with_sourcemap(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<CompileOutput, AdapterError> {
        let response = self.call(Operation::Sourcemap, source, Some(config)).await?;
        let css = Response::field(response.css, "css")?;
        let map = SourceMapDocument::try_from(Response::field(response.map, "map")?)?;
        Ok(CompileOutput { css, map })
    }
}
