//! Process runner shared by the scanner adapters
//!
//! Adapters that wrap an executable follow one pattern:
//! 1. Build the command line from their resolved plugin config
//! 2. Run it with [`run_external_tool`] (timeout, captured output)
//! 3. Hand the captured report to their `parse_report`

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ToolError;

/// Result from running an external tool
#[derive(Debug, Clone)]
pub struct ExternalToolResult {
    /// Whether the process ran to completion (it may still report findings)
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub return_code: Option<i32>,
    pub timed_out: bool,
    /// Error message if the process could not run
    pub error: Option<String>,
}

impl ExternalToolResult {
    pub fn success(stdout: String, stderr: String, return_code: i32) -> Self {
        Self {
            success: true,
            stdout,
            stderr,
            return_code: Some(return_code),
            timed_out: false,
            error: None,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            return_code: None,
            timed_out: false,
            error: Some(error),
        }
    }

    pub fn timeout(tool_name: &str, timeout_secs: u64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            return_code: None,
            timed_out: true,
            error: Some(format!("{} timed out after {}s", tool_name, timeout_secs)),
        }
    }

    /// Stdout as the tool's report, or the matching `ToolError`.
    ///
    /// Scanners signal findings through non-zero exit codes, so the exit code
    /// alone is not treated as failure.
    pub fn into_report(self, tool_name: &str, timeout_secs: u64) -> Result<String, ToolError> {
        if self.timed_out {
            return Err(ToolError::TimedOut {
                tool: tool_name.to_string(),
                timeout_secs,
            });
        }
        if !self.success {
            return Err(ToolError::Failed {
                tool: tool_name.to_string(),
                message: self.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        if self.stdout.trim().is_empty() && !self.stderr.trim().is_empty() {
            return Err(ToolError::Failed {
                tool: tool_name.to_string(),
                message: self.stderr.trim().to_string(),
            });
        }
        Ok(self.stdout)
    }
}

/// Run an external tool, capturing stdout and stderr
///
/// # Arguments
/// * `cmd` - Command and arguments to run
/// * `tool_name` - Human-readable tool name for error messages
/// * `timeout_secs` - Timeout in seconds (0 = no timeout)
/// * `cwd` - Working directory for the tool
pub fn run_external_tool(
    cmd: &[String],
    tool_name: &str,
    timeout_secs: u64,
    cwd: Option<&Path>,
) -> ExternalToolResult {
    let Some((program, args)) = cmd.split_first() else {
        return ExternalToolResult::failure("Empty command".to_string());
    };

    debug!("Running {}: {} {:?}", tool_name, program, args);

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                return ExternalToolResult::failure(format!(
                    "{} not found. Please install it first.",
                    tool_name
                ));
            }
            return ExternalToolResult::failure(format!("Failed to run {}: {}", tool_name, e));
        }
    };

    wait_with_timeout(child, tool_name, timeout_secs)
}

/// Drain a pipe on its own thread so a chatty tool cannot block on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn wait_with_timeout(mut child: Child, tool_name: &str, timeout_secs: u64) -> ExternalToolResult {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if timeout_secs > 0 && start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!("{} timed out after {}s", tool_name, timeout_secs);
                    return ExternalToolResult::timeout(tool_name, timeout_secs);
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return ExternalToolResult::failure(format!(
                    "Failed to wait for {}: {}",
                    tool_name, e
                ));
            }
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();
    ExternalToolResult::success(stdout, stderr, status.code().unwrap_or(-1))
}

/// Version string of an installed tool (first line of `<tool> --version`)
pub fn tool_version(tool: &str) -> Option<String> {
    let output = Command::new(tool)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let first = text.lines().next().unwrap_or("").trim();
    Some(if first.is_empty() { "unknown".to_string() } else { first.to_string() })
}

/// Path relative to the scan root when it lies inside it
pub fn relative_path(path: &str, root: &Path) -> String {
    Path::new(path)
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.trim_start_matches("./").to_string())
}
