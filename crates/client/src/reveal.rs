//! Typewriter reveal of a complete assistant reply.
//!
//! Purely cosmetic: the full text is already known. The task publishes the
//! number of visible characters on a `watch` channel and stops when it is
//! cancelled or dropped.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How fast the reveal advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPace {
    pub chars_per_tick: usize,
    pub tick: Duration,
}

impl Default for RevealPace {
    fn default() -> Self {
        Self {
            chars_per_tick: 2,
            tick: Duration::from_millis(15),
        }
    }
}

/// The first `chars` characters of `text`, cut on a char boundary.
pub fn prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// A running reveal. Aborted on `cancel()` and on drop.
pub struct RevealTask {
    handle: JoinHandle<()>,
    shown: watch::Receiver<usize>,
    total: usize,
}

impl RevealTask {
    /// Start revealing `text` at `pace`. Must be called inside a tokio runtime.
    pub fn spawn(text: &str, pace: RevealPace) -> Self {
        let total = text.chars().count();
        let step = pace.chars_per_tick.max(1);
        let (tx, rx) = watch::channel(0usize);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(pace.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut shown = 0;
            while shown < total {
                interval.tick().await;
                shown = (shown + step).min(total);
                if tx.send(shown).is_err() {
                    break;
                }
            }
        });

        Self {
            handle,
            shown: rx,
            total,
        }
    }

    /// Receiver of the visible character count; closes when the reveal ends.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.shown.clone()
    }

    pub fn total_chars(&self) -> usize {
        self.total
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RevealTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_respects_char_boundaries() {
        let text = "héllo 👋 wörld";
        assert_eq!(prefix(text, 0), "");
        assert_eq!(prefix(text, 2), "hé");
        assert_eq!(prefix(text, 7), "héllo 👋");
        assert_eq!(prefix(text, 100), text);
    }

    #[tokio::test]
    async fn test_reveal_runs_to_completion() {
        let task = RevealTask::spawn("Doug likes blue.", RevealPace {
            chars_per_tick: 3,
            tick: Duration::from_millis(1),
        });
        let mut rx = task.subscribe();

        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            seen.push(*rx.borrow_and_update());
        }

        assert_eq!(seen.last(), Some(&task.total_chars()));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_drop_cancels_reveal() {
        let task = RevealTask::spawn(&"x".repeat(1000), RevealPace {
            chars_per_tick: 1,
            tick: Duration::from_secs(10),
        });
        let mut rx = task.subscribe();
        drop(task);

        let closed = tokio::time::timeout(Duration::from_secs(1), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
        assert!(*rx.borrow() < 1000);
    }

    #[tokio::test]
    async fn test_cancel_stops_task() {
        let task = RevealTask::spawn(&"y".repeat(500), RevealPace {
            chars_per_tick: 1,
            tick: Duration::from_secs(10),
        });
        task.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(task.is_finished());
    }
}
