//! Subprocess supervision with an optional wall-clock budget
//!
//! Both subprocess backends funnel through [`run_with_deadline`]: spawn
//! with piped output, drain stdout and stderr on reader threads so a
//! chatty tool cannot fill the pipe and stall, and poll for exit until
//! the deadline passes, at which point the child is killed.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{Result, RuntimeError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a supervised process ended
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The process exited on its own
    Exited {
        /// Exit status
        status: ExitStatus,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },
    /// The deadline passed and the process was killed
    TimedOut,
}

/// Run `command` to completion, killing it when `timeout` elapses.
///
/// Spawn failures surface as I/O errors; everything after a successful
/// spawn is reported through [`Outcome`].
pub(crate) fn run_with_deadline(
    mut command: Command,
    timeout: Option<Duration>,
) -> Result<Outcome> {
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let program = command.get_program().to_string_lossy().into_owned();
    log::debug!("spawning {:?}", command);
    let mut child = command
        .spawn()
        .map_err(|e| RuntimeError::io(format!("spawning {}", program), &e))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        None => child
            .wait()
            .map_err(|e| RuntimeError::io(format!("waiting for {}", program), &e))?,
        Some(budget) => match poll_until(&mut child, budget, &program)? {
            Some(status) => status,
            None => {
                kill_quietly(&mut child, &program);
                join_reader(stdout);
                join_reader(stderr);
                return Ok(Outcome::TimedOut);
            }
        },
    };

    Ok(Outcome::Exited {
        status,
        stdout: join_reader(stdout),
        stderr: join_reader(stderr),
    })
}

/// Poll for exit until `budget` elapses; `None` means the budget passed
fn poll_until(
    child: &mut Child,
    budget: Duration,
    program: &str,
) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + budget;
    loop {
        match child
            .try_wait()
            .map_err(|e| RuntimeError::io(format!("polling {}", program), &e))?
        {
            Some(status) => return Ok(Some(status)),
            None if Instant::now() >= deadline => return Ok(None),
            None => std::thread::sleep(POLL_INTERVAL),
        }
    }
}

fn kill_quietly(child: &mut Child, program: &str) {
    if let Err(err) = child.kill() {
        log::warn!("failed to kill {}: {}", program, err);
    }
    if let Err(err) = child.wait() {
        log::warn!("failed to reap {}: {}", program, err);
    }
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> Option<JoinHandle<String>> {
    pipe.map(|mut source| {
        std::thread::spawn(move || {
            let mut buffer = String::new();
            if source.read_to_string(&mut buffer).is_err() {
                log::warn!("child output was not valid UTF-8, dropping it");
            }
            buffer
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output_of_exited_process() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo out; echo err >&2");
        let outcome = run_with_deadline(command, None).expect("runs");
        match outcome {
            Outcome::Exited {
                status,
                stdout,
                stderr,
            } => {
                assert!(status.success());
                assert_eq!(stdout.trim(), "out");
                assert_eq!(stderr.trim(), "err");
            }
            Outcome::TimedOut => panic!("unexpected timeout"),
        }
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("exit 3");
        match run_with_deadline(command, Some(Duration::from_secs(5))).expect("runs") {
            Outcome::Exited { status, .. } => assert_eq!(status.code(), Some(3)),
            Outcome::TimedOut => panic!("unexpected timeout"),
        }
    }

    #[test]
    fn test_deadline_kills_the_child() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let started = Instant::now();
        match run_with_deadline(command, Some(Duration::from_millis(1))).expect("runs") {
            Outcome::TimedOut => {}
            Outcome::Exited { .. } => panic!("sleep should not finish"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_program_is_an_io_error() {
        let command = Command::new("definitely-not-a-real-binary-7c2f");
        assert!(matches!(
            run_with_deadline(command, None),
            Err(RuntimeError::Io { .. })
        ));
    }
}
