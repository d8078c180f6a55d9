mod process;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task;

use crate::console::{
    ServerConsole, CANCEL_COMMAND, DISABLE_SHUTDOWN_COMMAND, ENABLE_SHUTDOWN_COMMAND,
    SHUTDOWN_COMMAND,
};
use crate::coordinator::ShutdownCoordinator;
use crate::log_line::LogLine;
use crate::poweroff;

pub use process::ServerProcess;

pub struct Config {
    pub server_jar: PathBuf,
    pub shutdown_enabled: bool,
    pub shutdown_delay: Duration,
}

/// State shared by the two pumps and the coordinator.
///
/// The permission flag is the only cross-task mutable value; it is a plain
/// atomic because its writers are single boolean stores and reading a value
/// that is one operator line stale is acceptable.
pub struct Context {
    pub console: Arc<dyn ServerConsole>,
    pub shutdown_enabled: AtomicBool,
    pub shutdown_delay: Duration,
}

/// Spawns the server and supervises it until it exits.
///
/// Runs the operator pump and the output pump concurrently, reacts to
/// SIGINT/SIGTERM by stopping the server cleanly, and powers off the host
/// when a player-triggered shutdown ran to completion with the permission
/// flag still set.
pub async fn run(config: Config) -> Result<()> {
    let (process, stdout) = ServerProcess::spawn(&config.server_jar)?;
    info!("server started (pid {})", process.pid());

    let ctx = Arc::new(Context {
        console: Arc::new(process.clone()),
        shutdown_enabled: AtomicBool::new(config.shutdown_enabled),
        shutdown_delay: config.shutdown_delay,
    });
    let coordinator = ShutdownCoordinator::new(Arc::clone(&ctx));

    let operator = task::spawn(operator_pump(
        Arc::clone(&ctx),
        BufReader::new(io::stdin()),
        process.exit_watch(),
    ));

    // The output pump runs as its own task so the server's stdout keeps
    // being drained while the terminate path below waits for the exit: a
    // stopping server flushes more output than a pipe buffer holds, and
    // would block on a full pipe otherwise.
    let mut output = task::spawn(output_pump(BufReader::new(stdout), coordinator.clone()));

    let player_shutdown = tokio::select! {
        player_shutdown = &mut output => {
            Some(player_shutdown.expect("output pump should not panic"))
        }
        _ = wait_for_terminate() => None,
    };

    // Quiesce any in-flight countdown before touching the child.
    coordinator.halt().await;

    if player_shutdown.is_none() {
        info!("termination requested; stopping the server");
        ctx.console.stop().await;
    }
    let exit_code = process.wait().await;
    info!("server shut down with exit code {exit_code}");

    if player_shutdown.is_none() {
        _ = output.await;
    }
    _ = operator.await;

    if player_shutdown == Some(true) && ctx.shutdown_enabled.load(AtomicOrdering::Relaxed) {
        info!("powering off the host");
        poweroff::power_off()?;
    }

    Ok(())
}

/// Reads operator lines until the server exits or the input ends.
///
/// The two toggle phrases flip the permission flag; everything else is
/// forwarded to the server verbatim. A read failure is reported through the
/// server's command channel and ends the pump, never the program.
async fn operator_pump<R>(ctx: Arc<Context>, reader: R, mut exit: watch::Receiver<Option<i32>>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        tokio::select! {
            changed = exit.changed() => {
                if changed.is_err() || exit.borrow_and_update().is_some() {
                    break;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(input)) => handle_operator_line(&ctx, &input).await,
                Ok(None) => break,
                Err(err) => {
                    ctx.console
                        .say(&format!("Error processing input: {err}"))
                        .await;
                    break;
                }
            },
        }
    }
}

async fn handle_operator_line(ctx: &Context, input: &str) {
    if input.eq_ignore_ascii_case(ENABLE_SHUTDOWN_COMMAND) {
        ctx.shutdown_enabled.store(true, AtomicOrdering::Relaxed);
        ctx.console.say("Shutdown has been enabled").await;
        ctx.console
            .say(&format!(
                "Type '{SHUTDOWN_COMMAND}' or '{CANCEL_COMMAND}' to control the server"
            ))
            .await;
    } else if input.eq_ignore_ascii_case(DISABLE_SHUTDOWN_COMMAND) {
        ctx.shutdown_enabled.store(false, AtomicOrdering::Relaxed);
        ctx.console.say("Shutdown has been disabled").await;
    } else {
        ctx.console.send_line(input).await;
    }
}

/// Reads the server's stdout to the end, echoing every line and dispatching
/// player-issued triggers to the coordinator. Returns whether the server
/// went down through a completed player-triggered countdown.
async fn output_pump<R>(reader: R, coordinator: ShutdownCoordinator) -> bool
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                println!("{line}");
                let Some(log_line) = LogLine::parse(&line) else {
                    continue;
                };
                if log_line.command.eq_ignore_ascii_case(SHUTDOWN_COMMAND) {
                    debug!("player {} requested a shutdown", log_line.player);
                    coordinator.request_start().await;
                } else if log_line.command.eq_ignore_ascii_case(CANCEL_COMMAND) {
                    debug!("player {} requested to cancel the shutdown", log_line.player);
                    coordinator.request_cancel().await;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!("failed to read server output: {err}");
                break;
            }
        }
    }
    coordinator.player_shutdown()
}

#[cfg(unix)]
async fn wait_for_terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).expect("failed to install signal handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::task::{Context as TaskContext, Poll};
    use std::time::Duration;

    use indoc::indoc;
    use tokio::io::{AsyncRead, AsyncWriteExt, BufReader, ReadBuf};
    use tokio::sync::watch;
    use tokio::time;

    use super::{operator_pump, output_pump, Context};
    use crate::console::testing::FakeConsole;
    use crate::console::ServerConsole;
    use crate::coordinator::ShutdownCoordinator;

    fn test_context(console: &Arc<FakeConsole>, enabled: bool, delay_secs: f64) -> Arc<Context> {
        Arc::new(Context {
            console: Arc::clone(console) as Arc<dyn ServerConsole>,
            shutdown_enabled: AtomicBool::new(enabled),
            shutdown_delay: Duration::from_secs_f64(delay_secs),
        })
    }

    #[tokio::test]
    async fn test_operator_toggles_permission_and_forwards_the_rest() {
        let console = Arc::new(FakeConsole::new());
        let ctx = test_context(&console, false, 30.0);
        let (_exit_tx, exit_rx) = watch::channel(None);

        let input = &b"ENABLE Shutdown\nlist\ndisable shutdown\n"[..];
        operator_pump(Arc::clone(&ctx), input, exit_rx).await;

        assert!(!ctx.shutdown_enabled.load(AtomicOrdering::Relaxed));
        assert_eq!(
            console.lines(),
            vec![
                "/say Shutdown has been enabled",
                "/say Type '!shutdown' or '!cancel' to control the server",
                "list",
                "/say Shutdown has been disabled",
            ]
        );
    }

    #[tokio::test]
    async fn test_operator_pump_stops_once_the_server_exits() {
        let console = Arc::new(FakeConsole::new());
        let ctx = test_context(&console, false, 30.0);
        let (exit_tx, exit_rx) = watch::channel(None);

        // An input stream that never produces a line.
        let (_open_end, silent) = tokio::io::duplex(64);
        let pump = tokio::task::spawn(operator_pump(ctx, BufReader::new(silent), exit_rx));

        exit_tx.send(Some(0)).unwrap();
        pump.await.unwrap();
        assert!(console.lines().is_empty());
    }

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "tty detached",
            )))
        }
    }

    #[tokio::test]
    async fn test_operator_read_error_is_reported_and_contained() {
        let console = Arc::new(FakeConsole::new());
        let ctx = test_context(&console, false, 30.0);
        let (_exit_tx, exit_rx) = watch::channel(None);

        operator_pump(ctx, BufReader::new(FailingReader), exit_rx).await;

        assert_eq!(
            console.lines(),
            vec!["/say Error processing input: tty detached"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_pump_player_shutdown_happy_path() {
        let (mut script, server_stdout) = tokio::io::duplex(1024);
        script
            .write_all(indoc! {b"
                [12:00:00] [Server thread/INFO]: Done (3.14s)! For help, type \"help\"
                [12:00:08] [Server thread/INFO]: <Alice> hello everyone
                [12:00:09] [Server thread/INFO]: <Alice> !shutdown
            "})
            .await
            .unwrap();

        // The fake console holds the write half and closes it upon `stop`,
        // ending the stream the way a stopping server would.
        let console = Arc::new(FakeConsole::with_stdout(script));
        let ctx = test_context(&console, true, 2.0);
        let coordinator = ShutdownCoordinator::new(ctx);

        let player_shutdown = output_pump(BufReader::new(server_stdout), coordinator).await;

        assert!(player_shutdown);
        assert_eq!(
            console.lines(),
            vec![
                "/say Shutting down in 2 seconds",
                "/say Type '!cancel' to abort the shutdown",
                "/say 2",
                "/say 1",
                "/say Server stopping...",
                "stop",
            ]
        );
    }

    #[tokio::test]
    async fn test_output_pump_refuses_trigger_while_disabled() {
        let input: &[u8] = b"[12:00:00] [Server thread/INFO]: <Alice> !shutdown\n";
        let console = Arc::new(FakeConsole::new());
        let ctx = test_context(&console, false, 2.0);
        let coordinator = ShutdownCoordinator::new(ctx);

        let player_shutdown = output_pump(input, coordinator).await;

        assert!(!player_shutdown);
        assert_eq!(console.lines(), vec!["/say Doing nothing. Shutdown is disabled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_pump_cancel_aborts_the_countdown() {
        let input: &[u8] = indoc! {b"
            [12:00:00] [Server thread/INFO]: <Alice> !shutdown
            [12:00:01] [Server thread/INFO]: <Bob> !CANCEL
        "};
        let console = Arc::new(FakeConsole::new());
        let ctx = test_context(&console, true, 5.0);
        let coordinator = ShutdownCoordinator::new(ctx);

        let player_shutdown = output_pump(input, coordinator).await;
        time::sleep(Duration::from_secs(30)).await;

        assert!(!player_shutdown);
        assert!(console.sent("/say Aborting shutdown"));
        assert!(!console.sent("stop"));
    }

    #[tokio::test]
    async fn test_output_pump_ignores_non_trigger_lines() {
        let input: &[u8] = indoc! {b"
            Starting minecraft server version 1.21
            [12:00:00] [Worker-Main-1/INFO]: <Alice> !shutdown
            [12:00:01] [Server thread/INFO]: <Alice> tp Bob
            [12:00:02] [Server thread/INFO]: Alice left the game
        "};
        let console = Arc::new(FakeConsole::new());
        let ctx = test_context(&console, true, 2.0);
        let coordinator = ShutdownCoordinator::new(ctx);

        let player_shutdown = output_pump(input, coordinator).await;

        assert!(!player_shutdown);
        assert!(console.lines().is_empty());
    }

    #[tokio::test]
    async fn test_output_pump_keeps_draining_through_a_small_pipe() {
        // A stopping server flushes far more output than a pipe buffer
        // holds; the writes below only complete if the pump, running as its
        // own task, is still consuming while the writer is busy.
        let (mut script, server_stdout) = tokio::io::duplex(64);
        let console = Arc::new(FakeConsole::new());
        let ctx = test_context(&console, true, 2.0);
        let coordinator = ShutdownCoordinator::new(ctx);

        let pump = tokio::task::spawn(output_pump(BufReader::new(server_stdout), coordinator));

        for i in 0..100 {
            let line = format!("[12:00:00] [Server thread/INFO]: Saving chunks for level {i}\n");
            script.write_all(line.as_bytes()).await.unwrap();
        }
        drop(script);

        assert!(!pump.await.unwrap());
        assert!(console.lines().is_empty());
    }
}
