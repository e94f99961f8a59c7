// src/sandbox.rs
//! Runs generated JavaScript snippets in an embedded interpreter.
//!
//! **WARNING:** this is a thin isolation layer, not a security boundary. Each
//! snippet is evaluated by a short-lived worker process (this same binary,
//! started with [`WORKER_FLAG`]) holding a fresh `boa_engine` context that
//! exposes the ECMAScript built-ins plus a `console` object and nothing else
//! (no filesystem, network or process access). Memory use is not bounded.
//! Wall-clock time is: a worker that overruns is killed with SIGKILL and
//! reaped before `run` returns.

use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use boa_engine::native_function::NativeFunction;
use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{Context, JsResult, JsValue, Source, js_string};
use boa_gc::{Gc, GcRefCell};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

/// First argument that switches the binary into sandbox worker mode.
pub const WORKER_FLAG: &str = "--sandbox-worker";

const LOOP_LIMIT_VAR: &str = "GUESS_SANDBOX_LOOP_LIMIT";
const DEFAULT_LOOP_ITERATION_LIMIT: u64 = 10_000_000;
const DEFAULT_RECURSION_LIMIT: usize = 512;

/// Shared slot holding the first line logged by the snippet.
type FirstLine = Gc<GcRefCell<Option<String>>>;

/// Result of running one snippet.
///
/// At most one of the two fields is set; both empty means the snippet ran
/// without logging anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    fn captured(output: Option<String>) -> Self {
        Self { output, error: None }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            output: None,
            error: Some(error.into()),
        }
    }
}

/// One argument passed to `console.log`, classified for formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedValue {
    Text(String),
    /// Rendered by the engine's own number-to-string conversion.
    Number(String),
    Boolean(bool),
    Null,
    Undefined,
    /// Objects and arrays, already encoded with `JSON.stringify`.
    Structured(String),
    /// Functions, symbols and bigints, coerced to a string.
    Opaque(String),
}

impl CapturedValue {
    fn from_js(value: &JsValue, context: &mut Context) -> Self {
        if let Some(text) = value.as_string() {
            return CapturedValue::Text(text.to_std_string_escaped());
        }
        if value.is_number() {
            return CapturedValue::Number(coerce_to_string(value, context));
        }
        if let Some(flag) = value.as_boolean() {
            return CapturedValue::Boolean(flag);
        }
        if value.is_null() {
            return CapturedValue::Null;
        }
        if value.is_undefined() {
            return CapturedValue::Undefined;
        }
        if let Some(object) = value.as_object() {
            if !object.is_callable() {
                if let Ok(Some(encoded)) = json_stringify(value, context) {
                    return CapturedValue::Structured(encoded);
                }
            }
        }
        CapturedValue::Opaque(coerce_to_string(value, context))
    }
}

impl fmt::Display for CapturedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturedValue::Text(s)
            | CapturedValue::Number(s)
            | CapturedValue::Structured(s)
            | CapturedValue::Opaque(s) => f.write_str(s),
            CapturedValue::Boolean(b) => write!(f, "{}", b),
            CapturedValue::Null => f.write_str("null"),
            CapturedValue::Undefined => f.write_str("undefined"),
        }
    }
}

fn json_stringify(value: &JsValue, context: &mut Context) -> JsResult<Option<String>> {
    let json = context.global_object().get(js_string!("JSON"), context)?;
    let Some(json_object) = json.as_object() else {
        return Ok(None);
    };
    let stringify = json_object.get(js_string!("stringify"), context)?;
    let Some(stringify) = stringify.as_callable() else {
        return Ok(None);
    };
    let encoded = stringify.call(&json, std::slice::from_ref(value), context)?;
    Ok(encoded.as_string().map(|s| s.to_std_string_escaped()))
}

fn coerce_to_string(value: &JsValue, context: &mut Context) -> String {
    match value.to_string(context) {
        Ok(s) => s.to_std_string_escaped(),
        Err(_) => value.display().to_string(),
    }
}

/// Executes snippets in a worker process with a wall-clock timeout.
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    timeout: Duration,
    loop_iteration_limit: u64,
    /// Worker executable; the current executable when unset.
    program: Option<PathBuf>,
    args: Vec<String>,
}

impl SandboxRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            loop_iteration_limit: DEFAULT_LOOP_ITERATION_LIMIT,
            program: None,
            args: vec![WORKER_FLAG.to_string()],
        }
    }

    pub fn with_loop_iteration_limit(mut self, limit: u64) -> Self {
        self.loop_iteration_limit = limit;
        self
    }

    /// Uses `program` with `args` as the worker instead of re-running the
    /// current executable.
    pub fn with_worker(mut self, program: impl Into<PathBuf>, args: &[&str]) -> Self {
        self.program = Some(program.into());
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Runs `code` and reports the first logged line or the error it raised.
    ///
    /// Never panics. Returns within roughly the timeout; an overrunning
    /// worker is killed and reaped first.
    pub async fn run(&self, code: &str) -> ExecutionOutcome {
        self.run_worker(code).await.0
    }

    /// Same as [`run`](Self::run), also reporting the worker's pid.
    async fn run_worker(&self, code: &str) -> (ExecutionOutcome, Option<u32>) {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => match std::env::current_exe() {
                Ok(exe) => exe,
                Err(e) => {
                    return (
                        ExecutionOutcome::failed(format!("could not locate sandbox worker: {}", e)),
                        None,
                    );
                }
            },
        };

        // env_clear keeps the host environment out of the worker;
        // kill_on_drop covers cancellation of this future.
        let spawned = Command::new(&program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .env(LOOP_LIMIT_VAR, self.loop_iteration_limit.to_string())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return (
                    ExecutionOutcome::failed(format!("could not start sandbox worker: {}", e)),
                    None,
                );
            }
        };
        let pid = child.id();

        let finished = tokio::time::timeout(self.timeout, exchange(&mut child, code)).await;
        let outcome = match finished {
            Ok(Ok(exit)) => exit.into_outcome(),
            Ok(Err(e)) => {
                let _ = child.kill().await;
                ExecutionOutcome::failed(format!("sandbox worker I/O failed: {}", e))
            }
            Err(_) => {
                log::warn!(
                    "Snippet exceeded {}ms, killing worker {:?}",
                    self.timeout.as_millis(),
                    pid
                );
                if let Err(e) = child.kill().await {
                    log::warn!("Could not kill sandbox worker: {}", e);
                }
                ExecutionOutcome::failed(format!(
                    "Script execution timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        };

        (outcome, pid)
    }
}

struct WorkerExit {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl WorkerExit {
    fn into_outcome(self) -> ExecutionOutcome {
        if self.status.success() {
            if let Ok(outcome) = serde_json::from_slice::<ExecutionOutcome>(&self.stdout) {
                return outcome;
            }
        }
        log::debug!(
            "Sandbox worker stderr: {}",
            String::from_utf8_lossy(&self.stderr).trim()
        );
        ExecutionOutcome::failed(format!(
            "sandbox worker terminated unexpectedly ({})",
            self.status
        ))
    }
}

/// Feeds the snippet to the worker and collects everything it writes.
async fn exchange(child: &mut Child, code: &str) -> std::io::Result<WorkerExit> {
    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(code.as_bytes()).await {
            // A worker that died early is reported through its exit status.
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
            _ => {}
        }
    }

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let (read_out, read_err) = tokio::join!(
        read_pipe(stdout_pipe, &mut stdout),
        read_pipe(stderr_pipe, &mut stderr),
    );
    read_out?;
    read_err?;

    let status = child.wait().await?;
    Ok(WorkerExit {
        status,
        stdout,
        stderr,
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(buf).await?;
    }
    Ok(())
}

/// Worker-mode entry point: reads a snippet from stdin, runs it, and writes
/// the `ExecutionOutcome` as JSON to stdout. Returns the process exit code.
pub fn serve_worker() -> i32 {
    let mut code = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut code) {
        eprintln!("sandbox worker could not read snippet: {}", e);
        return 2;
    }

    let loop_limit = std::env::var(LOOP_LIMIT_VAR)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LOOP_ITERATION_LIMIT);

    let outcome = guarded(|| execute(&code, loop_limit, DEFAULT_RECURSION_LIMIT));

    let mut stdout = std::io::stdout().lock();
    let written = serde_json::to_writer(&mut stdout, &outcome)
        .map_err(std::io::Error::from)
        .and_then(|()| stdout.flush());
    match written {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("sandbox worker could not report outcome: {}", e);
            2
        }
    }
}

/// Turns an engine panic into an error outcome instead of a dead worker.
fn guarded<F>(run: F) -> ExecutionOutcome
where
    F: FnOnce() -> ExecutionOutcome + std::panic::UnwindSafe,
{
    std::panic::catch_unwind(run).unwrap_or_else(|_| ExecutionOutcome::failed("sandbox engine crashed"))
}

/// Runs the snippet on the current thread in a fresh context.
fn execute(code: &str, loop_limit: u64, recursion_limit: usize) -> ExecutionOutcome {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(loop_limit);
    context
        .runtime_limits_mut()
        .set_recursion_limit(recursion_limit);

    let first_line: FirstLine = Gc::new(GcRefCell::new(None));
    if let Err(e) = install_console(&mut context, first_line.clone()) {
        return ExecutionOutcome::failed(format!("could not prepare sandbox: {}", e));
    }

    match context.eval(Source::from_bytes(code)) {
        Ok(_) => {
            let output: Option<String> = (*first_line.borrow()).clone();
            ExecutionOutcome::captured(output)
        }
        Err(e) => ExecutionOutcome::failed(e.to_string()),
    }
}

/// Exposes `console.log` (first call captured) and no-op `warn`, `error`, `info`.
fn install_console(context: &mut Context, first_line: FirstLine) -> JsResult<()> {
    let log = NativeFunction::from_copy_closure_with_captures(
        |_this, args, first_line: &FirstLine, context| {
            if first_line.borrow().is_some() {
                return Ok(JsValue::undefined());
            }
            let line = args
                .iter()
                .map(|arg| CapturedValue::from_js(arg, context).to_string())
                .collect::<Vec<_>>()
                .join(" ");
            *first_line.borrow_mut() = Some(line);
            Ok(JsValue::undefined())
        },
        first_line,
    );

    let console = ObjectInitializer::new(context)
        .function(log, js_string!("log"), 0)
        .function(ignore(), js_string!("warn"), 0)
        .function(ignore(), js_string!("error"), 0)
        .function(ignore(), js_string!("info"), 0)
        .build();

    context.register_global_property(js_string!("console"), console, Attribute::all())
}

fn ignore() -> NativeFunction {
    NativeFunction::from_fn_ptr(|_this, _args, _context| Ok(JsValue::undefined()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn run(code: &str) -> ExecutionOutcome {
        execute(code, DEFAULT_LOOP_ITERATION_LIMIT, DEFAULT_RECURSION_LIMIT)
    }

    #[test]
    fn test_captures_loop_result() {
        let outcome = run("for(let i=0;i<3;i++){} console.log(3);");
        assert_eq!(outcome.output.as_deref(), Some("3"));
        assert_eq!(outcome.error, None);
    }

    #[test]
    fn test_only_first_log_is_captured() {
        let outcome = run(
            "console.log('first', 1);\nfor (let i = 0; i < 5; i++) { console.log(i); }\nconsole.log('last');",
        );
        assert_eq!(outcome.output.as_deref(), Some("first 1"));
    }

    #[test]
    fn test_thrown_error_is_reported_without_output() {
        let outcome = run("let total = 1;\nconsole.log(missingVariable + total);");
        assert_eq!(outcome.output, None);
        let error = outcome.error.expect("reference error expected");
        assert!(error.contains("missingVariable"), "error was: {error}");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let outcome = run("let = ;");
        assert_eq!(outcome.output, None);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_no_log_leaves_both_fields_empty() {
        let outcome = run("let sum = 0; for (let i = 0; i < 4; i++) { sum += i; }");
        assert_eq!(outcome, ExecutionOutcome::default());
    }

    #[test]
    fn test_other_console_methods_are_silent() {
        let outcome = run("console.warn('w'); console.error('e'); console.info('i'); console.log('ok');");
        assert_eq!(outcome.output.as_deref(), Some("ok"));
    }

    #[test]
    fn test_host_capabilities_are_absent() {
        let outcome = run("console.log(typeof require, typeof process, typeof fetch);");
        assert_eq!(outcome.output.as_deref(), Some("undefined undefined undefined"));
    }

    #[test]
    fn test_argument_formatting() {
        let outcome =
            run("console.log('s', 1.5, 10, true, null, undefined, [1, 2], {a: 'b'}, 0.1 + 0.2);");
        assert_eq!(
            outcome.output.as_deref(),
            Some(r#"s 1.5 10 true null undefined [1,2] {"a":"b"} 0.30000000000000004"#)
        );
    }

    #[test]
    fn test_numbers_use_javascript_notation() {
        let cases = [
            ("console.log(1e21);", "1e+21"),
            ("console.log(2 ** 70);", "1.1805916207174113e+21"),
            ("console.log(0.0000001);", "1e-7"),
            ("console.log(-0);", "0"),
            ("console.log(0 / 0, 1 / 0, -1 / 0);", "NaN Infinity -Infinity"),
            ("console.log(120);", "120"),
        ];
        for (code, expected) in cases {
            assert_eq!(run(code).output.as_deref(), Some(expected), "for {code}");
        }
    }

    #[test]
    fn test_loop_limit_stops_runaway_loops() {
        let outcome = execute("while (true) {}", 1_000, DEFAULT_RECURSION_LIMIT);
        assert_eq!(outcome.output, None);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_engine_panic_becomes_error_outcome() {
        let outcome = guarded(|| panic!("engine bug"));
        assert_eq!(outcome.output, None);
        assert_eq!(outcome.error.as_deref(), Some("sandbox engine crashed"));

        assert_eq!(guarded(|| run("console.log(2);")).output.as_deref(), Some("2"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_overrunning_worker_is_killed_and_reaped() {
        let sandbox = SandboxRunner::new(Duration::from_millis(200))
            .with_worker("/bin/sh", &["-c", "while :; do :; done"]);

        let start = Instant::now();
        let (outcome, pid) = sandbox.run_worker("console.log(1);").await;

        assert_eq!(outcome.output, None);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Script execution timed out after 200ms")
        );
        assert!(start.elapsed() < Duration::from_secs(5));

        let pid = pid.expect("worker pid");
        assert!(
            !std::path::Path::new(&format!("/proc/{}", pid)).exists(),
            "worker {pid} still alive after timeout"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crashed_worker_is_an_error_outcome() {
        let sandbox = SandboxRunner::new(Duration::from_secs(5))
            .with_worker("/bin/sh", &["-c", "echo 'engine panicked' >&2; exit 101"]);

        let outcome = sandbox.run("console.log(1);").await;
        assert_eq!(outcome.output, None);
        let error = outcome.error.expect("crash error expected");
        assert!(error.contains("terminated unexpectedly"), "error was: {error}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_garbled_worker_output_is_an_error_outcome() {
        let sandbox = SandboxRunner::new(Duration::from_secs(5))
            .with_worker("/bin/sh", &["-c", "echo not-json"]);

        let outcome = sandbox.run("console.log(1);").await;
        assert_eq!(outcome.output, None);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_missing_worker_is_an_error_outcome() {
        let sandbox = SandboxRunner::new(Duration::from_secs(1))
            .with_worker("/nonexistent/guess-worker", &[]);

        let outcome = sandbox.run("console.log(1);").await;
        let error = outcome.error.expect("spawn error expected");
        assert!(error.starts_with("could not start sandbox worker"), "error was: {error}");
    }
}
