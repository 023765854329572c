// Cancellable per-turn draft countdown.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Events emitted by an armed turn timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed; `remaining` seconds are left on the clock.
    Tick { remaining: u32, generation: u64 },
    /// The countdown reached zero without being cancelled.
    Expired { generation: u64 },
}

impl TimerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TimerEvent::Tick { generation, .. } => *generation,
            TimerEvent::Expired { generation } => *generation,
        }
    }
}

/// Cooperative 1 Hz countdown for the team on the clock.
///
/// Arming cancels any previous countdown and bumps a generation counter that
/// is threaded through every emitted event, so the receiving side can discard
/// events from a turn that has already advanced. A stale timer must never
/// re-arm an already-advanced turn — cancel-on-pick is the load-bearing
/// contract, not the tick mechanism.
#[derive(Debug, Default)]
pub struct TurnTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl TurnTimer {
    pub fn new() -> Self {
        TurnTimer::default()
    }

    /// Start a countdown of `seconds`, cancelling any previous one. Returns
    /// the generation stamped onto this countdown's events.
    pub fn arm(&mut self, seconds: u32, tx: mpsc::Sender<TimerEvent>) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;

        let handle = tokio::spawn(async move {
            let mut remaining = seconds;
            while remaining > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                remaining -= 1;
                if tx
                    .send(TimerEvent::Tick {
                        remaining,
                        generation,
                    })
                    .await
                    .is_err()
                {
                    // Receiver dropped — nothing left to tick for.
                    return;
                }
            }
            let _ = tx.send(TimerEvent::Expired { generation }).await;
        });

        self.handle = Some(handle);
        debug!("turn timer armed for {seconds}s (generation {generation})");
        generation
    }

    /// Stop the countdown immediately (selection made or draft reset).
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// The generation of the most recently armed countdown.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an event belongs to the current countdown.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_down_and_expires() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timer = TurnTimer::new();
        let generation = timer.arm(3, tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event, TimerEvent::Expired { .. });
            events.push(event);
            if done {
                break;
            }
        }

        assert_eq!(
            events,
            vec![
                TimerEvent::Tick {
                    remaining: 2,
                    generation
                },
                TimerEvent::Tick {
                    remaining: 1,
                    generation
                },
                TimerEvent::Tick {
                    remaining: 0,
                    generation
                },
                TimerEvent::Expired { generation },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_the_previous_countdown() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timer = TurnTimer::new();

        let first = timer.arm(30, tx.clone());
        // The pick comes in immediately; a new turn starts.
        let second = timer.arm(2, tx);
        assert_ne!(first, second);
        assert!(!timer.is_current(first));
        assert!(timer.is_current(second));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event, TimerEvent::Expired { .. });
            events.push(event);
            if done {
                break;
            }
        }

        // Every delivered event belongs to the second countdown.
        assert!(events.iter().all(|e| e.generation() == second));
        assert!(events.contains(&TimerEvent::Expired { generation: second }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_delivery() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timer = TurnTimer::new();
        timer.arm(30, tx);
        timer.cancel();

        // Channel closes once the aborted task's sender is dropped.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_detectable() {
        let (tx, _rx) = mpsc::channel(16);
        let mut timer = TurnTimer::new();
        let g1 = timer.arm(5, tx.clone());
        let g2 = timer.arm(5, tx);

        assert!(!timer.is_current(g1));
        assert!(timer.is_current(g2));
    }
}
