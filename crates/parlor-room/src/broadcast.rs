//! Debounced fan-out trigger for room-list broadcasts.

use std::time::Duration;

use tokio::sync::mpsc;

/// Leading+trailing debouncer.
///
/// Bursts of [`trigger`](Debouncer::trigger) calls collapse into at most
/// two fires: one immediately (leading edge) and, if more triggers arrive
/// inside the window, one when the window closes (trailing edge). The
/// consumer reads fire signals off the receiver returned by
/// [`Debouncer::new`] and does the actual list computation and fan-out.
#[derive(Clone)]
pub struct Debouncer {
    triggers: mpsc::UnboundedSender<()>,
}

impl Debouncer {
    /// Spawns the debounce task and returns the handle plus the stream of
    /// fire signals.
    pub fn new(window: Duration) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (trigger_tx, mut trigger_rx) = mpsc::unbounded_channel::<()>();
        let (fire_tx, fire_rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            // Outer loop: idle until the first trigger of a burst.
            while trigger_rx.recv().await.is_some() {
                if fire_tx.send(()).is_err() {
                    return;
                }
                // Inner loop: coalesce triggers window by window until a
                // full window passes quietly.
                loop {
                    let deadline = tokio::time::sleep(window);
                    tokio::pin!(deadline);
                    let mut pending = false;
                    loop {
                        tokio::select! {
                            _ = &mut deadline => break,
                            more = trigger_rx.recv() => match more {
                                Some(()) => pending = true,
                                None => {
                                    if pending {
                                        let _ = fire_tx.send(());
                                    }
                                    return;
                                }
                            },
                        }
                    }
                    if !pending {
                        break;
                    }
                    if fire_tx.send(()).is_err() {
                        return;
                    }
                }
            }
        });

        (
            Self {
                triggers: trigger_tx,
            },
            fire_rx,
        )
    }

    /// Requests a broadcast. Never blocks.
    pub fn trigger(&self) {
        let _ = self.triggers.send(());
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Timing tests run on Tokio's paused clock: sleeps resolve
    //! instantly once the runtime is otherwise idle, so the tests are
    //! fast and deterministic.

    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    /// Lets the debounce task observe queued triggers before advancing.
    async fn settle() {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<()>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trigger_fires_leading_edge_only() {
        let (debouncer, mut fires) = Debouncer::new(WINDOW);

        debouncer.trigger();
        settle().await;
        assert_eq!(drain(&mut fires), 1, "leading edge fires immediately");

        tokio::time::sleep(WINDOW * 2).await;
        settle().await;
        assert_eq!(drain(&mut fires), 0, "quiet window adds nothing");
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_leading_and_trailing() {
        let (debouncer, mut fires) = Debouncer::new(WINDOW);

        for _ in 0..10 {
            debouncer.trigger();
        }
        settle().await;
        assert_eq!(drain(&mut fires), 1, "one leading fire for the burst");

        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
        settle().await;
        assert_eq!(drain(&mut fires), 1, "one trailing fire after the window");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_burst_after_quiet_window_fires_again() {
        let (debouncer, mut fires) = Debouncer::new(WINDOW);

        debouncer.trigger();
        settle().await;
        tokio::time::sleep(WINDOW * 2).await;
        settle().await;
        drain(&mut fires);

        debouncer.trigger();
        settle().await;
        assert_eq!(drain(&mut fires), 1, "fresh burst gets a leading edge");
    }
}
