//! Idle detection: the backstop that closes sessions nobody else will.

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::clock::Clock;
use crate::sink::Sink;
use crate::tracker::Tracker;

impl<S: Sink, C: Clock> Tracker<S, C> {
    /// Runs the idle sweep loop.
    ///
    /// Every activity mark pushes the shared deadline out; this task sleeps
    /// toward it and re-reads after waking, so a moved deadline just means
    /// another sleep. Only an unmoved, expired deadline triggers the sweep.
    pub(crate) fn spawn_idle_task(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let deadline = { this.shared.state.lock().await.idle_deadline };
                let Some(deadline) = deadline else {
                    // No activity yet (or just swept); wait for the next mark.
                    this.shared.idle_notify.notified().await;
                    continue;
                };

                if Instant::now() < deadline {
                    tokio::select! {
                        () = sleep_until(deadline) => {}
                        () = this.shared.idle_notify.notified() => {}
                    }
                    continue;
                }

                let expired = {
                    let mut state = this.shared.state.lock().await;
                    if state.idle_deadline == Some(deadline) {
                        state.idle_deadline = None;
                        true
                    } else {
                        false
                    }
                };
                if expired {
                    tracing::debug!("idle timeout reached, flushing open sessions");
                    this.flush_all(true).await;
                }
            }
        })
    }
}
