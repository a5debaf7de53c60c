//! Real shell sessions backed by `su` / `sh` child processes.

use super::Shell;
use crate::{SessionError, SessionResult};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{Pid, Uid};
use once_cell::sync::OnceCell;
use std::io::{self, Read, Write};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Shell backed by the device's root broker.
///
/// Command lines are written to the child's stdin so the whole batch runs in
/// the same process; stdout is collected once stdin is closed and the child
/// exits.
#[derive(Debug)]
pub struct SuShell {
    su_binary: String,
    sh_binary: String,
    timeout: Option<Duration>,
    root: OnceCell<bool>,
}

impl Default for SuShell {
    fn default() -> Self {
        Self::new("su", "sh", None)
    }
}

impl SuShell {
    pub fn new(
        su_binary: impl Into<String>,
        sh_binary: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            su_binary: su_binary.into(),
            sh_binary: sh_binary.into(),
            timeout,
            root: OnceCell::new(),
        }
    }

    fn probe_root(&self) -> bool {
        if Uid::effective().is_root() {
            return true;
        }
        match self.su(&[String::from("id")]) {
            Ok(lines) => lines.iter().any(|line| line.contains("uid=0")),
            Err(err) => {
                log::debug!("root probe failed: {}", err);
                false
            }
        }
    }

    /// The binary used for elevated batches. Already-root processes skip `su`.
    fn elevated_program(&self) -> &str {
        if Uid::effective().is_root() {
            &self.sh_binary
        } else {
            &self.su_binary
        }
    }
}

impl Shell for SuShell {
    fn root_access(&self) -> bool {
        *self.root.get_or_init(|| self.probe_root())
    }

    fn su(&self, lines: &[String]) -> SessionResult<Vec<String>> {
        run_session(self.elevated_program(), lines, self.timeout)
    }

    fn sh(&self, lines: &[String]) -> SessionResult<Vec<String>> {
        run_session(&self.sh_binary, lines, self.timeout)
    }
}

fn map_spawn_err(program: &str, err: io::Error) -> SessionError {
    if err.kind() == io::ErrorKind::NotFound {
        return SessionError::CommandNotFound(program.to_string());
    }
    SessionError::Spawn {
        program: program.to_string(),
        source: err,
    }
}

fn run_session(
    program: &str,
    lines: &[String],
    timeout: Option<Duration>,
) -> SessionResult<Vec<String>> {
    log::debug!("[{}] {:?}", program, lines);

    let mut child = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Own process group, so a timeout can take down everything the batch started.
        .process_group(0)
        .spawn()
        .map_err(|e| map_spawn_err(program, e))?;

    let script: String = lines.iter().map(|line| format!("{}\n", line)).collect();
    let mut stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Feed and drain on separate threads so a chatty batch cannot fill a pipe and stall.
    let stdin_handle = std::thread::spawn(move || {
        if let Some(mut input) = stdin.take() {
            if let Err(err) = input.write_all(script.as_bytes()) {
                log::debug!("shell stdin closed early: {}", err);
            }
        }
    });
    let stdout_handle = std::thread::spawn(move || drain(stdout));
    let stderr_handle = std::thread::spawn(move || drain(stderr));

    let status = match wait(&mut child, program, timeout) {
        Ok(status) => status,
        Err(err) => {
            let _ = stdin_handle.join();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(err);
        }
    };

    let _ = stdin_handle.join();
    let out = stdout_handle.join().unwrap_or_default();
    let err = stderr_handle.join().unwrap_or_default();

    let stderr_text = String::from_utf8_lossy(&err);
    if !stderr_text.trim().is_empty() {
        log::debug!("[{}] stderr: {}", program, stderr_text.trim());
    }

    let output: Vec<String> = String::from_utf8_lossy(&out)
        .lines()
        .map(str::to_string)
        .collect();

    if !status.success() && output.is_empty() {
        return Err(SessionError::NoContext {
            program: program.to_string(),
            code: status.code(),
        });
    }
    Ok(output)
}

fn wait(child: &mut Child, program: &str, timeout: Option<Duration>) -> SessionResult<ExitStatus> {
    let Some(timeout) = timeout else {
        return Ok(child.wait()?);
    };
    match child.wait_timeout(timeout)? {
        Some(status) => Ok(status),
        None => {
            kill_group(child);
            let _ = child.wait();
            Err(SessionError::Timeout {
                program: program.to_string(),
                timeout,
            })
        }
    }
}

/// Kill the session and any descendants still holding its pipes.
fn kill_group(child: &mut Child) {
    let Ok(pid) = i32::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        log::debug!("killpg {} failed: {}", pid, err);
        let _ = child.kill();
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}
