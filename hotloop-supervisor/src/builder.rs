//! Running the external build command.

use async_trait::async_trait;
use hotloop_core::{BuildFailure, BuildRun, Configuration, FailureClassifier};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Produces the binary the supervisor runs.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Runs one build to completion.
    async fn build(&self, run: &BuildRun) -> Result<(), BuildFailure>;
}

/// Builds by invoking `<build_command> build -v -o <out> <target>`.
///
/// Standard output goes straight to the console. Standard error is
/// forwarded as it arrives and also captured, so failures can be
/// classified and reported.
pub struct CommandBuilder {
    program: String,
    args: Vec<OsString>,
    output_dir: PathBuf,
    classifier: FailureClassifier,
}

impl CommandBuilder {
    pub fn new(config: &Configuration) -> Self {
        let mut command = config.build_command.iter();
        let program = command.next().cloned().unwrap_or_else(|| "go".to_string());
        let mut args: Vec<OsString> = command.map(OsString::from).collect();
        args.extend(config.build_args());

        Self {
            program,
            args,
            output_dir: config.build_path.clone(),
            classifier: FailureClassifier::new(config.fatal_markers.clone()),
        }
    }

    fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

#[async_trait]
impl Builder for CommandBuilder {
    async fn build(&self, _run: &BuildRun) -> Result<(), BuildFailure> {
        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            warn!("Failed to create {}: {}", self.output_dir.display(), e);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BuildFailure::transient(format!("failed to start '{}': {}", self.program, e))
            })?;

        info!(
            "Running: {} (PID: {})",
            self.command_line(),
            child.id().unwrap_or_default()
        );

        let captured = match child.stderr.take() {
            Some(stderr) => tee(stderr, tokio::io::stderr()).await,
            None => Vec::new(),
        };

        let status = child.wait().await.map_err(|e| {
            BuildFailure::transient(format!("failed to wait for '{}': {}", self.program, e))
        })?;

        if status.success() {
            return Ok(());
        }

        let diagnostics = String::from_utf8_lossy(&captured);
        Err(self
            .classifier
            .failure(format!("{}\n{}", status, diagnostics.trim_end())))
    }
}

/// Copies `output` to `console` as it arrives and returns all of it.
///
/// A console that stops accepting writes is left alone; capture goes on.
async fn tee<R, W>(mut output: R, mut console: W) -> Vec<u8>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut captured = Vec::new();
    let mut forwarding = true;
    let mut buf = [0u8; 4096];
    loop {
        let n = match output.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Lost build output: {}", e);
                break;
            }
        };
        captured.extend_from_slice(&buf[..n]);

        if forwarding {
            if let Err(e) = console.write_all(&buf[..n]).await {
                debug!("Stopped forwarding build output: {}", e);
                forwarding = false;
            }
        }
    }
    captured
}


#[cfg(all(test, unix))]
mod command_tests {
    use super::*;
    use hotloop_core::{FailureKind, Trigger};
    use std::path::Path;
    use tempfile::tempdir;

    fn builder_with(script: &str, out: &Path) -> CommandBuilder {
        let mut config = Configuration::for_project(Path::new("demo"));
        config.build_path = out.to_path_buf();
        config.build_command = vec!["sh".into(), "-c".into(), script.into(), "sh".into()];
        CommandBuilder::new(&config)
    }

    #[test]
    fn test_command_line_appends_build_args() {
        let mut config = Configuration::for_project(Path::new("demo"));
        config.build_path = PathBuf::from("tmp");
        let builder = CommandBuilder::new(&config);
        assert_eq!(builder.command_line(), "go build -v -o tmp/demo .");
    }

    #[tokio::test]
    async fn test_successful_build() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("tmp");
        let builder = builder_with("exit 0", &out);

        let run = BuildRun::start(Trigger::Startup);
        assert!(builder.build(&run).await.is_ok());
        assert!(out.is_dir());
    }

    #[tokio::test]
    async fn test_compile_error_is_transient_with_diagnostics() {
        let dir = tempdir().unwrap();
        let builder = builder_with("echo './main.go:3:1: undefined: foo' >&2; exit 2", dir.path());

        let failure = builder
            .build(&BuildRun::start(Trigger::Startup))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Transient);
        assert!(failure.diagnostics.contains("undefined: foo"));
    }

    #[tokio::test]
    async fn test_no_source_is_fatal() {
        let dir = tempdir().unwrap();
        let builder = builder_with(
            "echo 'package .: no buildable Go source files in /src' >&2; exit 1",
            dir.path(),
        );

        let failure = builder
            .build(&BuildRun::start(Trigger::Startup))
            .await
            .unwrap_err();
        assert!(failure.is_fatal());
    }

    #[tokio::test]
    async fn test_missing_build_tool_is_transient() {
        let dir = tempdir().unwrap();
        let mut config = Configuration::for_project(Path::new("demo"));
        config.build_path = dir.path().to_path_buf();
        config.build_command = vec!["hotloop-no-such-build-tool".into()];
        let builder = CommandBuilder::new(&config);

        let failure = builder
            .build(&BuildRun::start(Trigger::Startup))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Transient);
        assert!(failure.diagnostics.contains("failed to start"));
    }
}
