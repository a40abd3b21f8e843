//! Wait gates between the transport and the sample flow.
//!
//! A [`Gate`] starts with a count of pending releases and opens when the
//! count reaches zero. Once open it stays open. One-shot gates start at 1.

use std::time::Duration;
use tokio::sync::watch;

/// Counting gate with timed waits
#[derive(Debug)]
pub struct Gate {
    remaining: watch::Sender<usize>,
}

impl Gate {
    /// Gate requiring `count` releases; zero is already open
    #[must_use]
    pub fn new(count: usize) -> Self {
        let (remaining, _) = watch::channel(count);
        Self { remaining }
    }

    /// Gate requiring a single release
    #[must_use]
    pub fn one_shot() -> Self {
        Self::new(1)
    }

    /// Count down by one; no effect once open
    pub fn release(&self) {
        self.remaining.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Open the gate regardless of the remaining count
    pub fn release_all(&self) {
        self.remaining.send_modify(|n| *n = 0);
    }

    /// Releases still needed before the gate opens
    #[must_use]
    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    /// Whether the gate is open
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.remaining() == 0
    }

    /// Wait until the gate opens or `timeout` elapses.
    ///
    /// Returns `true` if the gate opened in time.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.remaining.subscribe();
        let signaled = match tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0)).await {
            Ok(result) => result.is_ok(),
            Err(_) => false,
        };
        signaled
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::one_shot()
    }
}
