//! Shell and git subprocess action runner

use crate::actions::{ActionError, ActionOutput, ActionRunner, CheckoutRequest, CommandRequest};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};

/// Host variables every child inherits. Everything else comes from the run.
pub const INHERITED_ENV: &[&str] = &["PATH", "HOME", "USER", "TMPDIR", "LANG"];

/// Configuration for the shell action runner
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Shell used for build/test commands (invoked as `<shell> -c <command>`)
    pub shell: String,

    /// Path to the git executable
    pub git_path: String,

    /// Repository cloned when neither the step nor the pipeline names one
    pub default_source: Option<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            git_path: "git".to_string(),
            default_source: None,
        }
    }
}

impl ShellConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_git(mut self, git_path: impl Into<String>) -> Self {
        self.git_path = git_path.into();
        self
    }

    pub fn with_default_source(mut self, source: impl Into<String>) -> Self {
        self.default_source = Some(source.into());
        self
    }
}

/// Runs actions as child processes
///
/// Each child starts with a cleared environment plus [`INHERITED_ENV`] and
/// the request's variables. It leads its own process group; dropping the
/// action future kills the whole group.
#[derive(Debug, Clone)]
pub struct ShellActionRunner {
    config: ShellConfig,
}

impl ShellActionRunner {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    async fn git(&self, args: &[&str], request: &CheckoutRequest) -> Result<Output, ActionError> {
        debug!("git {}", args.join(" "));
        let mut command = host_command(&self.config.git_path);
        command
            .args(args)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env("GIT_TERMINAL_PROMPT", "0");
        output_in_process_group(command).await.map_err(|e| {
            ActionError::Unavailable(format!("failed to run {}: {}", self.config.git_path, e))
        })
    }
}

/// Command with a cleared environment holding only [`INHERITED_ENV`]
fn host_command(program: &str) -> Command {
    let mut command = Command::new(program);
    command.env_clear();
    for key in INHERITED_ENV {
        if let Some(value) = std::env::var_os(key) {
            command.env(key, value);
        }
    }
    command
}

/// Spawn `command` as the leader of a new process group and collect its
/// output. The group is killed if the returned future is dropped first.
async fn output_in_process_group(mut command: Command) -> std::io::Result<Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn()?;
    let guard = ProcessGroupGuard { pgid: child.id() };
    let output = child.wait_with_output().await;
    guard.disarm();
    output
}

/// Kills a process group on drop unless disarmed
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) => debug!("Killed process group {}", pgid),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

// kill_on_drop still stops the direct child
#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

fn to_action_output(output: Output) -> ActionOutput {
    ActionOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

fn checkout_failure(output: &Output) -> ActionError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output.status.code().unwrap_or(-1);
    ActionError::Checkout(format!("git exited with code {}: {}", code, stderr.trim()))
}

#[async_trait]
impl ActionRunner for ShellActionRunner {
    async fn checkout(&self, request: &CheckoutRequest) -> Result<ActionOutput, ActionError> {
        let source = request
            .repository
            .as_deref()
            .or(self.config.default_source.as_deref())
            .ok_or_else(|| ActionError::Unavailable("no repository configured for checkout".to_string()))?;

        let workdir = request.workdir.to_string_lossy().into_owned();
        let depth = request.depth.to_string();

        // A pinned commit may sit below a shallow tip, so clone full history
        let shallow = request.depth > 0 && request.commit.is_none();

        let mut args = vec!["clone", "--no-tags", "--branch", request.reference.as_str()];
        if shallow {
            args.extend(["--depth", depth.as_str(), "--single-branch"]);
        }
        args.extend([source, workdir.as_str()]);

        let clone = self.git(&args, request).await?;
        if !clone.status.success() {
            return Err(checkout_failure(&clone));
        }
        let mut output = to_action_output(clone);

        if let Some(commit) = &request.commit {
            let detach = self
                .git(&["-C", workdir.as_str(), "checkout", "--detach", commit.as_str()], request)
                .await?;
            if !detach.status.success() {
                return Err(checkout_failure(&detach));
            }
            let detach = to_action_output(detach);
            output.stdout.push_str(&detach.stdout);
            output.stderr.push_str(&detach.stderr);
        }

        debug!("Checked out {} at {} into {}", source, request.reference, workdir);
        Ok(output)
    }

    async fn run_command(&self, request: &CommandRequest) -> Result<ActionOutput, ActionError> {
        debug!("Spawning {} -c with command length: {}", self.config.shell, request.command.len());

        let mut command = host_command(&self.config.shell);
        command
            .arg("-c")
            .arg(&request.command)
            .current_dir(&request.workdir)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let output = output_in_process_group(command)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => ActionError::Unavailable(format!(
                    "failed to start {}: {}",
                    self.config.shell, e
                )),
                _ => ActionError::Internal(format!("failed to run command: {}", e)),
            })?;

        let output = to_action_output(output);
        debug!(
            "Command exited with {:?} ({} bytes stdout, {} bytes stderr)",
            output.exit_code,
            output.stdout.len(),
            output.stderr.len()
        );
        Ok(output)
    }
}
