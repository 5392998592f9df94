//src/executor/run.rs
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::{debug, info};

use super::diagnostics;
use crate::error::ExecError;
use crate::isolate::Isolator;
use crate::lifecycle::ArtifactTracker;
use crate::logger;
use crate::state::{ExecutionOutcome, FailureKind, ModuleFormat, TestRecord};

/// Best guess, then the opposite module format.
pub const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

enum Step {
    Spawn { format: ModuleFormat, attempt: usize },
    Finished(ExecutionOutcome),
}

/// Runs one test at a time against the configured runtime.
pub struct Supervisor<'a> {
    runtime: String,
    isolator: &'a Isolator,
    tracker: &'a ArtifactTracker,
    echo: bool,
}

impl<'a> Supervisor<'a> {
    pub fn new(runtime: impl Into<String>, isolator: &'a Isolator, tracker: &'a ArtifactTracker) -> Self {
        Self {
            runtime: runtime.into(),
            isolator,
            tracker,
            echo: true,
        }
    }

    /// Whether child output is forwarded to this process as it arrives.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /* ============================================================
       Single test, with module-format retry
       ============================================================ */

    pub fn run_test(&self, record: &TestRecord) -> Result<ExecutionOutcome, ExecError> {
        let content = fs::read_to_string(&record.file).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ExecError::NotFound {
                    path: record.file.clone(),
                }
            } else {
                ExecError::Io {
                    path: record.file.clone(),
                    source,
                }
            }
        })?;
        let isolated = self.isolator.isolate(&content, &record.description);

        let mut first: Option<ExecutionOutcome> = None;
        let mut step = Step::Spawn {
            format: record.module_format,
            attempt: 1,
        };

        loop {
            step = match step {
                Step::Spawn { format, attempt } => {
                    let artifact =
                        self.isolator
                            .write_artifact(&record.file, &isolated, format, self.tracker)?;
                    let result = self.execute(&artifact.path);
                    self.tracker.cleanup(&artifact);
                    let mut outcome = result?;
                    outcome.attempts = attempt;

                    let mismatch =
                        outcome.failure_kind == Some(FailureKind::ModuleFormatMismatch);
                    if mismatch && attempt < MAX_ATTEMPTS {
                        info!(
                            target: logger::RUNNER,
                            from = %format,
                            to = %format.opposite(),
                            "module format rejected, retrying"
                        );
                        first = Some(outcome);
                        Step::Spawn {
                            format: format.opposite(),
                            attempt: attempt + 1,
                        }
                    } else {
                        Step::Finished(resolve(first.take(), outcome))
                    }
                }
                Step::Finished(outcome) => return Ok(outcome),
            };
        }
    }

    /* ============================================================
       Single process
       ============================================================ */

    /// Spawns the runtime on `path` and waits for it. stdout and stderr are
    /// buffered in full while also being forwarded live.
    pub fn execute(&self, path: &Path) -> Result<ExecutionOutcome, ExecError> {
        if !path.exists() {
            return Err(ExecError::NotFound {
                path: path.to_path_buf(),
            });
        }

        debug!(target: logger::RUNNER, runtime = %self.runtime, file = %path.display(), "spawning");

        let mut child = Command::new(&self.runtime)
            .arg(path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                runtime: self.runtime.clone(),
                path: path.to_path_buf(),
                source,
            })?;

        let (tx, rx) = mpsc::channel::<(Stream, Vec<u8>)>();
        let readers = [
            child.stdout.take().map(|s| pump(s, Stream::Stdout, tx.clone())),
            child.stderr.take().map(|s| pump(s, Stream::Stderr, tx.clone())),
        ];
        drop(tx);

        let mut out = Vec::new();
        let mut err = Vec::new();
        for (stream, chunk) in rx.iter() {
            match stream {
                Stream::Stdout => {
                    if self.echo {
                        forward(&mut io::stdout(), &chunk);
                    }
                    out.extend_from_slice(&chunk);
                }
                Stream::Stderr => {
                    if self.echo {
                        forward(&mut io::stderr(), &chunk);
                    }
                    err.extend_from_slice(&chunk);
                }
            }
        }

        for handle in readers.into_iter().flatten() {
            let _ = handle.join();
        }

        let status = child.wait().map_err(|source| ExecError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let exit_code = status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&out).into_owned();
        let stderr = String::from_utf8_lossy(&err).into_owned();
        let failure_kind = diagnostics::classify(exit_code, &stderr);

        debug!(
            target: logger::RUNNER,
            exit_code,
            "test execution completed with status: {}",
            if exit_code == 0 { "passed" } else { "failed" }
        );

        Ok(ExecutionOutcome {
            exit_code,
            success: exit_code == 0,
            stdout,
            stderr,
            failure_kind,
            carried_diagnostic: None,
            attempts: 1,
        })
    }
}

/// Picks the outcome to report once the retry budget is spent.
///
/// A format rejection on the retry must not hide a genuine test failure
/// seen on the first attempt.
fn resolve(first: Option<ExecutionOutcome>, last: ExecutionOutcome) -> ExecutionOutcome {
    let Some(first) = first else {
        return last;
    };
    if last.success {
        return last;
    }

    if last.failure_kind == Some(FailureKind::ModuleFormatMismatch)
        && diagnostics::has_test_failure(&first.stdout, &first.stderr)
    {
        return ExecutionOutcome {
            failure_kind: Some(FailureKind::TestFailure {
                exit_code: first.exit_code,
            }),
            carried_diagnostic: None,
            attempts: last.attempts,
            ..first
        };
    }

    ExecutionOutcome {
        carried_diagnostic: Some(first.stderr),
        ..last
    }
}

fn pump<R>(mut source: R, stream: Stream, tx: Sender<(Stream, Vec<u8>)>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}

fn forward(sink: &mut dyn Write, chunk: &[u8]) {
    let _ = sink.write_all(chunk);
    let _ = sink.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(exit_code: i32, stdout: &str, stderr: &str) -> ExecutionOutcome {
        ExecutionOutcome {
            exit_code,
            success: exit_code == 0,
            stdout: stdout.into(),
            stderr: stderr.into(),
            failure_kind: diagnostics::classify(exit_code, stderr),
            carried_diagnostic: None,
            attempts: 1,
        }
    }

    #[test]
    fn single_attempt_is_returned_as_is() {
        let last = outcome(1, "", "boom");
        let got = resolve(None, last);
        assert_eq!(got.stderr, "boom");
        assert!(got.carried_diagnostic.is_none());
    }

    #[test]
    fn successful_retry_wins() {
        let first = outcome(1, "", "SyntaxError: Cannot use import statement outside a module");
        let got = resolve(Some(first), outcome(0, "ok", ""));
        assert!(got.success);
        assert_eq!(got.failure_kind, None);
    }

    #[test]
    fn genuine_failure_survives_a_format_error_on_retry() {
        let first = outcome(
            1,
            "FAIL  login works\n",
            "AssertionError: Expected 1 to equal 2\nCannot use import statement outside a module",
        );
        let mut last = outcome(1, "", "require is not defined in ES module scope");
        last.attempts = 2;

        let got = resolve(Some(first), last);
        assert_eq!(got.failure_kind, Some(FailureKind::TestFailure { exit_code: 1 }));
        assert!(got.stderr.contains("AssertionError"));
        assert_eq!(got.attempts, 2);
    }

    #[test]
    fn unrelated_retry_failure_carries_the_first_diagnostic() {
        let first = outcome(1, "", "Cannot use import statement outside a module");
        let got = resolve(Some(first), outcome(1, "", "Error: Cannot find module 'uvu'"));
        assert_eq!(
            got.failure_kind,
            Some(FailureKind::ModuleNotFound { name: "uvu".into() })
        );
        assert!(got
            .carried_diagnostic
            .unwrap()
            .contains("Cannot use import statement"));
    }

    #[test]
    fn missing_path_is_not_found() {
        let isolator = Isolator::default();
        let tracker = ArtifactTracker::new();
        let sup = Supervisor::new("node", &isolator, &tracker).echo(false);
        let err = sup.execute(Path::new("nonexistent.test.js")).unwrap_err();
        assert!(matches!(err, ExecError::NotFound { .. }));
    }
}
