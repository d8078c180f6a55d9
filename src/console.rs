use async_trait::async_trait;

/// Chat command players type to request a shutdown.
pub const SHUTDOWN_COMMAND: &str = "!shutdown";
/// Chat command players type to abort a pending shutdown.
pub const CANCEL_COMMAND: &str = "!cancel";
/// Operator phrase that allows players to shut the server down.
pub const ENABLE_SHUTDOWN_COMMAND: &str = "enable shutdown";
/// Operator phrase that disallows it again.
pub const DISABLE_SHUTDOWN_COMMAND: &str = "disable shutdown";
/// Console command a vanilla server understands as "save and exit".
pub const STOP_COMMAND: &str = "stop";

/// The command channel of the supervised server.
///
/// Everything the warden tells the server (or its players) funnels through
/// this trait, which makes the coordination logic testable without a real
/// child process. Implementations must swallow delivery failures: a line
/// that cannot be written (the server already exited) is logged and
/// dropped, never surfaced to the caller.
#[async_trait]
pub trait ServerConsole: Send + Sync {
    /// Writes one line to the server's stdin and echoes it to the
    /// operator's view.
    async fn send_line(&self, line: &str);

    /// Broadcasts a message to everyone on the server.
    async fn say(&self, message: &str) {
        self.send_line(&format!("/say {message}")).await;
    }

    /// Asks the server to save and exit.
    async fn stop(&self) {
        self.send_line(STOP_COMMAND).await;
    }
}
