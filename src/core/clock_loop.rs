//! Background clock loop
//!
//! Ticks the kitchen on a fixed real-time cadence until cancelled. A tick is
//! a single transaction, and cancellation is only observed between ticks, so
//! stopping the loop never leaves a partial tick behind.

use crate::core::kitchen::Kitchen;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Driver for periodic kitchen ticks
pub struct ClockLoop {
    kitchen: Kitchen,
    interval: Duration,
    token: CancellationToken,
}

impl ClockLoop {
    /// Create a new loop using the kitchen's configured tick interval
    pub fn new(kitchen: Kitchen) -> Self {
        let interval = kitchen.config().clock.tick_interval();
        Self {
            kitchen,
            interval,
            token: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Token that stops the loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run until cancelled, returning the number of committed ticks
    ///
    /// Store failures are logged and retried on the next tick.
    pub async fn run(self) -> u64 {
        let mut interval = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick of a tokio interval fires immediately
        interval.tick().await;

        let mut ticks = 0;
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    info!("Clock loop stopped after {} ticks", ticks);
                    break;
                }
                _ = interval.tick() => {
                    match self.kitchen.tick() {
                        Ok(report) => {
                            ticks += 1;
                            debug!("Clock loop tick {} at {}", ticks, report.now);
                        }
                        Err(e) => warn!("Clock loop tick failed, retrying next tick: {}", e),
                    }
                }
            }
        }
        ticks
    }

    /// Spawn the loop onto the current tokio runtime
    pub fn spawn(self) -> ClockLoopHandle {
        let token = self.cancellation_token();
        let handle = tokio::spawn(self.run());
        ClockLoopHandle { token, handle }
    }
}

/// Handle to a spawned clock loop
pub struct ClockLoopHandle {
    token: CancellationToken,
    handle: JoinHandle<u64>,
}

impl ClockLoopHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the loop and wait for it to finish its current tick
    ///
    /// Returns the number of committed ticks.
    pub async fn shutdown(self) -> u64 {
        self.token.cancel();
        match self.handle.await {
            Ok(ticks) => ticks,
            Err(e) => {
                warn!("Clock loop task ended abnormally: {}", e);
                0
            }
        }
    }
}
