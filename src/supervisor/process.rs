use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::{watch, Mutex};
use tokio::task;

use crate::console::ServerConsole;

/// Handle to the supervised server process.
///
/// Clones share the same child: the stdin pipe sits behind a lock so writes
/// from concurrent tasks never interleave, and the exit code is broadcast
/// over a watch channel once the child terminates.
#[derive(Clone)]
pub struct ServerProcess {
    inner: Arc<Inner>,
}

struct Inner {
    pid: u32,
    stdin: Mutex<Option<ChildStdin>>,
    exit_code_rx: watch::Receiver<Option<i32>>,
}

impl ServerProcess {
    /// Launches the server jar the vanilla way: `java -jar <jar> --nogui`,
    /// with the jar's directory as the working directory. The stdout pipe is
    /// handed back for the output pump; stderr stays attached to the
    /// operator's terminal.
    pub fn spawn(jar_path: &Path) -> Result<(Self, ChildStdout)> {
        let Some(jar_name) = jar_path.file_name() else {
            return Err(anyhow!("not a path to a server jar: {}", jar_path.display()));
        };
        let jar_dir = match jar_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut child = Command::new("java")
            .arg("-jar")
            .arg(jar_name)
            .arg("--nogui")
            .current_dir(jar_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let Some(pid) = child.id() else {
            return Err(anyhow!("server exited before being tracked"));
        };
        let Some(stdin) = child.stdin.take() else {
            return Err(anyhow!("cannot get stdin pipe"));
        };
        let Some(stdout) = child.stdout.take() else {
            return Err(anyhow!("cannot get stdout pipe"));
        };

        let (exit_code_tx, exit_code_rx) = watch::channel(None);
        task::spawn(async move {
            let exit_status = child.wait().await.expect("failed to wait child");
            // TODO: the exit code is simulated for servers killed by signals.
            let exit_code = exit_status.code().unwrap_or(1);
            info!("server process exited with code {exit_code}");
            _ = exit_code_tx.send(Some(exit_code));
        });

        let inner = Arc::new(Inner {
            pid,
            stdin: Mutex::new(Some(stdin)),
            exit_code_rx,
        });
        Ok((Self { inner }, stdout))
    }

    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    /// Channel that yields the exit code once the server terminates.
    pub fn exit_watch(&self) -> watch::Receiver<Option<i32>> {
        self.inner.exit_code_rx.clone()
    }

    /// Waits until the server has exited and returns its exit code.
    pub async fn wait(&self) -> i32 {
        let mut exit_code_rx = self.inner.exit_code_rx.clone();
        loop {
            if let Some(exit_code) = *exit_code_rx.borrow_and_update() {
                return exit_code;
            }
            exit_code_rx
                .changed()
                .await
                .expect("`exit_code` sender should not drop without sending values");
        }
    }
}

#[async_trait]
impl ServerConsole for ServerProcess {
    async fn send_line(&self, line: &str) {
        let mut stdin = self.inner.stdin.lock().await;
        let Some(pipe) = stdin.as_mut() else {
            warn!("server is not running; dropping command: {line}");
            return;
        };

        println!("> {line}");
        if let Err(err) = write_command(pipe, line).await {
            warn!("failed to write to the server: {err}");
            // The pipe is broken; further writes become no-ops.
            *stdin = None;
        }
    }
}

async fn write_command(pipe: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    pipe.write_all(line.as_bytes()).await?;
    pipe.write_all(b"\n").await?;
    pipe.flush().await
}
