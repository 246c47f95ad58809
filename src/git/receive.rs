//! git::receive
//!
//! Bridge between an HTTP push and `git receive-pack`.
//!
//! Pack processing is delegated to the git binary running in stateless-rpc
//! mode. The push payload is piped into its stdin and its stdout is copied to
//! the response as it is produced. Each transfer runs to completion on the
//! calling thread; there is no internal timeout.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;

use super::interface::{GitError, GitRepository};

/// Environment variable carrying the pushing user to git hooks.
pub const DEPLOYER_ENV_VAR: &str = "PUSHGATE_DEPLOYER";

/// Smart-HTTP service header preceding the ref advertisement.
const SERVICE_HEADER: &[u8] = b"001f# service=git-receive-pack\n0000";

/// Errors from bridging a push.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The git binary could not be started.
    #[error("failed to start git: {0}")]
    Spawn(#[source] io::Error),

    /// Reading the push payload failed.
    #[error("failed to read push payload: {0}")]
    Input(#[source] io::Error),

    /// Writing the git response failed, usually a disconnected client.
    #[error("failed to write response: {0}")]
    Output(#[source] io::Error),

    /// git exited unsuccessfully.
    #[error("git receive-pack failed ({status}): {stderr}")]
    Failed {
        /// Exit status as reported by the OS
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// The target repository could not be prepared.
    #[error(transparent)]
    Repository(#[from] GitError),
}

/// Serves the git side of a push.
pub trait GitServer: Send + Sync {
    /// Write the receive-pack ref advertisement.
    fn advertise_receive_pack(&self, output: &mut (dyn Write + Send)) -> Result<(), ReceiveError>;

    /// Stream `input` through receive-pack into `output`, recording
    /// `deployer` as the pushing user.
    fn receive(
        &self,
        deployer: Option<&str>,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> Result<(), ReceiveError>;
}

/// [`GitServer`] backed by the git command-line tool.
#[derive(Debug, Clone)]
pub struct GitCli {
    repository: GitRepository,
    git: PathBuf,
}

impl GitCli {
    /// Serve the repository at `repo_path` using the `git` executable.
    pub fn new(repo_path: impl Into<PathBuf>, git: impl Into<PathBuf>) -> Self {
        Self {
            repository: GitRepository::new(repo_path),
            git: git.into(),
        }
    }

    /// The served repository path.
    pub fn repo_path(&self) -> &Path {
        self.repository.path()
    }

    fn command(&self, deployer: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.git);
        cmd.arg("receive-pack").arg("--stateless-rpc");
        match deployer {
            Some(name) => cmd.env(DEPLOYER_ENV_VAR, name),
            None => cmd.env_remove(DEPLOYER_ENV_VAR),
        };
        cmd
    }
}

impl GitServer for GitCli {
    fn advertise_receive_pack(&self, output: &mut (dyn Write + Send)) -> Result<(), ReceiveError> {
        self.repository.init()?;

        let result = self
            .command(None)
            .arg("--advertise-refs")
            .arg(self.repo_path())
            .stdin(Stdio::null())
            .output()
            .map_err(ReceiveError::Spawn)?;

        if !result.status.success() {
            return Err(ReceiveError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        output.write_all(SERVICE_HEADER).map_err(ReceiveError::Output)?;
        output.write_all(&result.stdout).map_err(ReceiveError::Output)?;
        output.flush().map_err(ReceiveError::Output)
    }

    fn receive(
        &self,
        deployer: Option<&str>,
        input: &mut (dyn Read + Send),
        output: &mut (dyn Write + Send),
    ) -> Result<(), ReceiveError> {
        self.repository.init()?;

        let mut child = self
            .command(deployer)
            .arg(self.repo_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ReceiveError::Spawn)?;

        let missing = |name: &str| ReceiveError::Spawn(io::Error::other(format!("no {} pipe", name)));
        let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let mut stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (input_result, output_result, stderr_text) = thread::scope(|s| {
            let feeder = s.spawn(move || {
                let copied = io::copy(input, &mut stdin);
                // Closing stdin signals the end of the pack
                drop(stdin);
                copied
            });
            let collector = s.spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            });

            let output_result = io::copy(&mut stdout, output).and_then(|n| output.flush().map(|_| n));
            if output_result.is_err() {
                let _ = child.kill();
            }

            let input_result = feeder.join().unwrap_or_else(|p| std::panic::resume_unwind(p));
            let stderr_text = collector.join().unwrap_or_else(|p| std::panic::resume_unwind(p));
            (input_result, output_result, stderr_text)
        });

        let status = child.wait().map_err(ReceiveError::Spawn)?;

        let written = output_result.map_err(ReceiveError::Output)?;
        if !status.success() {
            return Err(ReceiveError::Failed {
                status: status.to_string(),
                stderr: stderr_text.trim().to_string(),
            });
        }
        let read = input_result.map_err(ReceiveError::Input)?;

        tracing::debug!(read, written, "receive-pack finished");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // Scripts are written before anything is spawned; keeping every fake-git
    // scenario in one test avoids ETXTBSY from concurrent forks.
    #[test]
    fn bridges_through_fake_git() {
        let temp = TempDir::new().unwrap();
        let echo = script(temp.path(), "echo-git", "exec cat");
        let deployer = script(temp.path(), "deployer-git", "printf '%s' \"$PUSHGATE_DEPLOYER\"");
        let failing = script(temp.path(), "failing-git", "cat >/dev/null; echo boom >&2; exit 3");
        let repo_path = temp.path().join("repository");

        // Payload flows through unchanged and the repository is created
        let git = GitCli::new(&repo_path, &echo);
        let mut output = Vec::new();
        git.receive(None, &mut &b"0000PACK"[..], &mut output).unwrap();
        assert_eq!(output, b"0000PACK");
        assert!(repo_path.join(".git").exists());

        // Deployer reaches git through the environment
        let git = GitCli::new(&repo_path, &deployer);
        let mut output = Vec::new();
        git.receive(Some("alice"), &mut io::empty(), &mut output).unwrap();
        assert_eq!(output, b"alice");

        // Non-zero exit surfaces stderr
        let git = GitCli::new(&repo_path, &failing);
        let err = git
            .receive(None, &mut &b"data"[..], &mut Vec::new())
            .unwrap_err();
        match err {
            ReceiveError::Failed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }

        // A broken response stream wins over everything else
        let git = GitCli::new(&repo_path, &echo);
        let err = git
            .receive(None, &mut &b"payload"[..], &mut FailingWriter)
            .unwrap_err();
        assert!(matches!(err, ReceiveError::Output(_)));

        let git = GitCli::new(&repo_path, temp.path().join("no-such-git"));
        let err = git
            .receive(None, &mut io::empty(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, ReceiveError::Spawn(_)));
    }
}
