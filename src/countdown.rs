use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time;

const TICK: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CountdownOutcome {
    Completed,
    Cancelled,
}

/// Counts whole seconds down to 1, invoking `on_tick` with the number of
/// seconds remaining before each one-second pause.
///
/// The duration is rounded up, so 3.2 seconds produce the ticks 4, 3, 2, 1.
/// Cancellation is checked before every tick and raced against every pause;
/// once observed, the countdown returns [`CountdownOutcome::Cancelled`]
/// without running the remaining ticks. A dropped sender counts as
/// cancellation. Each call is independent: a fresh receiver always runs the
/// full count.
pub async fn run_countdown<F, Fut>(
    duration: Duration,
    mut on_tick: F,
    cancel: &mut oneshot::Receiver<()>,
) -> CountdownOutcome
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = ()>,
{
    let ticks = duration.as_secs_f64().ceil() as u64;
    for remaining in (1..=ticks).rev() {
        match cancel.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => return CountdownOutcome::Cancelled,
        }

        on_tick(remaining).await;

        tokio::select! {
            biased;
            _ = &mut *cancel => return CountdownOutcome::Cancelled,
            _ = time::sleep(TICK) => {}
        }
    }

    CountdownOutcome::Completed
}
