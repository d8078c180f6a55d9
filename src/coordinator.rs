use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};

use crate::console::CANCEL_COMMAND;
use crate::countdown::{run_countdown, CountdownOutcome};
use crate::supervisor::Context;

/// Arbiter of the one shutdown countdown that may be in flight.
///
/// Two states: idle (no session) and counting down (a session is present).
/// `request_start` and `request_cancel` decide under a sync lock and report
/// every acceptance and refusal through the server's `/say` channel. The
/// countdown itself runs in a spawned task whose handle stays in the session,
/// so [`halt`](ShutdownCoordinator::halt) can join it during teardown.
/// Clones share the same session slot.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    ctx: Arc<Context>,
    id_seed: AtomicU64,
    session: Mutex<Option<Session>>,
    player_shutdown: AtomicBool,
}

struct Session {
    id: u64,
    cancel_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ShutdownCoordinator {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                id_seed: Default::default(),
                session: Default::default(),
                player_shutdown: Default::default(),
            }),
        }
    }

    /// Starts a shutdown countdown, unless one is already running or
    /// shutdowns are disabled. Returns whether the request was accepted;
    /// never waits for the countdown itself.
    pub async fn request_start(&self) -> bool {
        let ctx = &self.inner.ctx;
        if !ctx.shutdown_enabled.load(AtomicOrdering::Relaxed) {
            ctx.console.say("Doing nothing. Shutdown is disabled").await;
            return false;
        }

        let accepted = {
            let mut session = self.inner.session.lock();
            if session.is_some() {
                false
            } else {
                let id = self.inner.id_seed.fetch_add(1, AtomicOrdering::Relaxed);
                let (cancel_tx, cancel_rx) = oneshot::channel();
                let task = task::spawn(Inner::run_session(Arc::clone(&self.inner), id, cancel_rx));
                *session = Some(Session {
                    id,
                    cancel_tx,
                    task,
                });
                true
            }
        };

        if !accepted {
            ctx.console.say("Already shutting down").await;
        }
        accepted
    }

    /// Aborts the countdown in flight, if there is one and shutdowns are
    /// enabled. A cancel arriving after the countdown already finished is
    /// stale and simply refused.
    pub async fn request_cancel(&self) -> bool {
        let ctx = &self.inner.ctx;
        if !ctx.shutdown_enabled.load(AtomicOrdering::Relaxed) {
            ctx.console.say("Doing nothing. Shutdown is disabled").await;
            return false;
        }

        let Some(session) = self.inner.session.lock().take() else {
            ctx.console.say("Nothing to abort").await;
            return false;
        };
        _ = session.cancel_tx.send(());
        ctx.console.say("Aborting shutdown").await;
        true
    }

    /// Whether a player-triggered countdown has run to completion.
    pub fn player_shutdown(&self) -> bool {
        self.inner.player_shutdown.load(AtomicOrdering::Relaxed)
    }

    /// Cancels and joins the in-flight countdown task, if any. Safe to call
    /// repeatedly and from any teardown path.
    pub async fn halt(&self) {
        let session = self.inner.session.lock().take();
        let Some(Session { cancel_tx, task, .. }) = session else {
            return;
        };
        _ = cancel_tx.send(());
        _ = task.await;
    }
}

impl Inner {
    async fn run_session(inner: Arc<Inner>, id: u64, mut cancel_rx: oneshot::Receiver<()>) {
        let ctx = &inner.ctx;
        let delay_secs = ctx.shutdown_delay.as_secs_f64();
        ctx.console
            .say(&format!("Shutting down in {delay_secs} seconds"))
            .await;
        ctx.console
            .say(&format!("Type '{CANCEL_COMMAND}' to abort the shutdown"))
            .await;

        let console = &ctx.console;
        let outcome = run_countdown(
            ctx.shutdown_delay,
            |remaining| async move {
                console.say(&remaining.to_string()).await;
            },
            &mut cancel_rx,
        )
        .await;
        if outcome == CountdownOutcome::Cancelled {
            return;
        }

        // Claim the session. A cancel that raced the final tick has already
        // emptied the slot and wins: the stop must not be sent.
        let claimed = {
            let mut session = inner.session.lock();
            match session.as_ref() {
                Some(current) if current.id == id => {
                    *session = None;
                    true
                }
                _ => false,
            }
        };
        if !claimed {
            return;
        }

        inner.player_shutdown.store(true, AtomicOrdering::Relaxed);
        ctx.console.say("Server stopping...").await;
        ctx.console.stop().await;
    }
}
