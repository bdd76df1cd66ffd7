// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-boxed pairing session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::discovery::Candidate;

/// How often the candidate list is emitted.
pub const EMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Session length for relay board discovery.
pub const RELAY_DEADLINE: Duration = Duration::from_secs(30);

/// Session length for Espurna discovery.
pub const ESPURNA_DEADLINE: Duration = Duration::from_secs(10);

/// Source of candidates scanned during a session.
pub trait Scan: Send {
    /// Waits for the next observation and absorbs it.
    ///
    /// Returns `false` once nothing more will arrive.
    fn absorb_next(&mut self) -> impl Future<Output = bool> + Send;

    /// Returns the current best-known candidates, sorted for display.
    fn candidates(&self) -> Vec<Candidate>;
}

/// A pairing session.
///
/// [`run`](Self::run) emits the candidate list once per interval until the
/// deadline passes or [`stop`](Self::stop) is called, then emits one final
/// list and returns it. There is no "scan complete" signal on a broadcast
/// transport, so the caller always has a possibly-incomplete list to offer.
///
/// Clones share the stop signal.
#[derive(Debug, Clone)]
pub struct PairingSession {
    interval: Duration,
    deadline: Duration,
    stopped: Arc<watch::Sender<bool>>,
}

impl PairingSession {
    /// Creates a session.
    #[must_use]
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            interval,
            deadline,
            stopped: Arc::new(stopped),
        }
    }

    /// Session with the relay board cadence.
    #[must_use]
    pub fn for_relays() -> Self {
        Self::new(EMIT_INTERVAL, RELAY_DEADLINE)
    }

    /// Session with the Espurna cadence.
    #[must_use]
    pub fn for_espurna() -> Self {
        Self::new(EMIT_INTERVAL, ESPURNA_DEADLINE)
    }

    /// Returns the session length.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Ends the session early. Calling it again has no effect.
    pub fn stop(&self) {
        if !self.stopped.send_replace(true) {
            tracing::debug!("Pairing session stop requested");
        }
    }

    /// Returns `true` once the session has been stopped or has run out.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Drives `scan` until the deadline or a stop, emitting along the way.
    pub async fn run<S: Scan>(
        &self,
        mut scan: S,
        mut emit: impl FnMut(&[Candidate]) + Send,
    ) -> Vec<Candidate> {
        let mut stop = self.stopped.subscribe();
        let start = Instant::now();
        let deadline = tokio::time::sleep_until(start + self.deadline);
        tokio::pin!(deadline);
        let mut ticks = tokio::time::interval_at(start + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut scanning = true;

        tracing::info!(deadline = ?self.deadline, "Pairing session started");
        loop {
            tokio::select! {
                biased;
                () = stop_requested(&mut stop) => {
                    tracing::debug!("Pairing session stopped early");
                    break;
                }
                () = &mut deadline => break,
                _ = ticks.tick() => emit(&scan.candidates()),
                more = scan.absorb_next(), if scanning => {
                    if !more {
                        tracing::debug!("Scan source exhausted");
                        scanning = false;
                    }
                }
            }
        }
        self.stopped.send_replace(true);

        let last = scan.candidates();
        emit(&last);
        tracing::info!(found = last.len(), "Pairing session finished");
        last
    }
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Scan that yields nothing after a fixed list.
    struct Fixed(Vec<Candidate>);

    impl Scan for Fixed {
        async fn absorb_next(&mut self) -> bool {
            false
        }

        fn candidates(&self) -> Vec<Candidate> {
            self.0.clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_each_interval_then_once_more() {
        let session = PairingSession::new(Duration::from_secs(1), Duration::from_millis(3500));
        let mut emitted = 0;
        let last = session
            .run(Fixed(vec![Candidate::new("1", "Lamp")]), |list| {
                assert_eq!(list.len(), 1);
                emitted += 1;
            })
            .await;
        assert_eq!(emitted, 4);
        assert_eq!(last, vec![Candidate::new("1", "Lamp")]);
        assert!(session.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_early_and_is_idempotent() {
        let session = PairingSession::for_relays();
        let emitted = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&emitted);
        let runner = session.clone();
        let task = tokio::spawn(async move {
            runner
                .run(Fixed(Vec::new()), move |_| *counter.lock() += 1)
                .await
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.stop();
        session.stop();
        task.await.unwrap();
        assert_eq!(*emitted.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_before_run_emits_final_list_only() {
        let session = PairingSession::for_espurna();
        session.stop();
        let mut emitted = 0;
        session.run(Fixed(Vec::new()), |_| emitted += 1).await;
        assert_eq!(emitted, 1);
    }
}
