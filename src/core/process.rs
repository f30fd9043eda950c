/*
 * Typed invocation of external programs. Collaborators (database engine,
 * provisioning tool, site runtime) describe each call as a `ProcessInvocation`:
 * program plus discrete argv entries, never a shell string, so values coming from
 * packages or the command line cannot inject shell syntax. Secret arguments are
 * passed through unchanged but rendered as `***` whenever an invocation is
 * logged or displayed.
 *
 * Execution goes through `ProcessRunnerOperations` so orchestrator tests can
 * capture invocations instead of spawning processes.
 */
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

#[derive(Debug)]
pub enum ProcessError {
    Spawn { program: String, source: io::Error },
    Redirect { path: PathBuf, source: io::Error },
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Spawn { program, source } => {
                write!(f, "Could not start '{program}': {source}")
            }
            ProcessError::Redirect { path, source } => {
                write!(f, "Could not open {path:?} for redirection: {source}")
            }
            ProcessError::Failed {
                command,
                status,
                stderr,
            } => {
                let status = status.map_or_else(|| "signal".to_string(), |code| code.to_string());
                write!(f, "'{command}' exited with status {status}")?;
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::Spawn { source, .. } => Some(source),
            ProcessError::Redirect { source, .. } => Some(source),
            ProcessError::Failed { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProcessError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Plain(String),
    Secret(String),
}

impl Arg {
    pub fn value(&self) -> &str {
        match self {
            Arg::Plain(value) | Arg::Secret(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessInvocation {
    pub program: String,
    pub args: Vec<Arg>,
    pub env: Vec<(String, String)>,
    pub stdin_file: Option<PathBuf>,
    pub stdout_file: Option<PathBuf>,
}

impl ProcessInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        ProcessInvocation {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(value.into()));
        self
    }

    /// Adds `--name=value`.
    pub fn option(self, name: &str, value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        self.arg(format!("--{name}={value}"))
    }

    /// Adds `--name=value` only when `value` is present and non-empty.
    pub fn optional(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.option(name, value),
            _ => self,
        }
    }

    /// Adds `--name=value`, masked when displayed.
    pub fn secret_option(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.args
            .push(Arg::Secret(format!("--{name}={}", value.as_ref())));
        self
    }

    pub fn flag(self, name: &str) -> Self {
        self.arg(format!("--{name}"))
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_file = Some(path.into());
        self
    }

    /// Argument values as they will be handed to the program.
    pub fn arg_values(&self) -> Vec<&str> {
        self.args.iter().map(Arg::value).collect()
    }

    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|arg| arg.value() == value)
    }
}

impl fmt::Display for ProcessInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            match arg {
                Arg::Plain(value) => write!(f, " {value}")?,
                Arg::Secret(value) => match value.split_once('=') {
                    Some((name, _)) => write!(f, " {name}=***")?,
                    None => write!(f, " ***")?,
                },
            }
        }
        if let Some(path) = &self.stdin_file {
            write!(f, " < {}", path.display())?;
        }
        if let Some(path) = &self.stdout_file {
            write!(f, " > {}", path.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
}

pub trait ProcessRunnerOperations: Send + Sync {
    /*
     * Runs the invocation to completion. Non-zero exit is an error; captured
     * stdout is returned unless it was redirected to a file.
     */
    fn run(&self, invocation: &ProcessInvocation) -> Result<ProcessOutput>;
}

pub struct CoreProcessRunner {}

impl CoreProcessRunner {
    pub fn new() -> Self {
        CoreProcessRunner {}
    }

    fn open_redirect(path: &Path, for_write: bool) -> Result<File> {
        let opened = if for_write {
            File::create(path)
        } else {
            File::open(path)
        };
        opened.map_err(|source| ProcessError::Redirect {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for CoreProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunnerOperations for CoreProcessRunner {
    fn run(&self, invocation: &ProcessInvocation) -> Result<ProcessOutput> {
        log::debug!("CoreProcessRunner: Running {invocation}");
        let mut command = Command::new(&invocation.program);
        command.args(invocation.args.iter().map(Arg::value));
        for (key, value) in &invocation.env {
            command.env(key, value);
        }
        match &invocation.stdin_file {
            Some(path) => {
                command.stdin(Stdio::from(Self::open_redirect(path, false)?));
            }
            None => {
                command.stdin(Stdio::null());
            }
        }
        match &invocation.stdout_file {
            Some(path) => {
                command.stdout(Stdio::from(Self::open_redirect(path, true)?));
            }
            None => {
                command.stdout(Stdio::piped());
            }
        }
        command.stderr(Stdio::piped());

        let output = command.output().map_err(|source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(failure(invocation, output.status, stderr));
        }
        if !stderr.trim().is_empty() {
            log::debug!("CoreProcessRunner: {} stderr: {}", invocation.program, stderr.trim());
        }
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

fn failure(invocation: &ProcessInvocation, status: ExitStatus, stderr: String) -> ProcessError {
    ProcessError::Failed {
        command: invocation.to_string(),
        status: status.code(),
        stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builder_keeps_values_as_discrete_arguments() {
        let invocation = ProcessInvocation::new("wp")
            .arg("core")
            .arg("install")
            .option("title", "My \"quoted\" site; rm -rf /")
            .optional("url", Some(""))
            .optional("locale", None)
            .flag("skip-email");
        assert_eq!(
            invocation.arg_values(),
            vec![
                "core",
                "install",
                "--title=My \"quoted\" site; rm -rf /",
                "--skip-email"
            ]
        );
    }

    #[test]
    fn test_display_masks_secrets() {
        let invocation = ProcessInvocation::new("wp")
            .arg("config")
            .arg("create")
            .secret_option("dbpass", "hunter2")
            .stdout_to("/tmp/out.sql");
        let shown = invocation.to_string();
        assert_eq!(shown, "wp config create --dbpass=*** > /tmp/out.sql");
        assert!(invocation.has_arg("--dbpass=hunter2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_core_runner_captures_stdout_and_reports_failure() {
        let runner = CoreProcessRunner::new();
        let output = runner
            .run(&ProcessInvocation::new("sh").arg("-c").arg("printf hello"))
            .unwrap();
        assert_eq!(output.stdout, "hello");

        let error = runner
            .run(&ProcessInvocation::new("sh").arg("-c").arg("echo oops >&2; exit 3"))
            .unwrap_err();
        match error {
            ProcessError::Failed { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr.trim(), "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_core_runner_redirects_files() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, "piped through\n").unwrap();
        CoreProcessRunner::new()
            .run(
                &ProcessInvocation::new("cat")
                    .stdin_from(&input)
                    .stdout_to(&output),
            )
            .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "piped through\n");
    }

    #[test]
    fn test_core_runner_reports_missing_program() {
        let error = CoreProcessRunner::new()
            .run(&ProcessInvocation::new("definitely-not-a-real-program-wpbatch"))
            .unwrap_err();
        assert!(matches!(error, ProcessError::Spawn { .. }));
    }
}
