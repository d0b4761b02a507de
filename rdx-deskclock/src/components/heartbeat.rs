//! Registry of cancelable recurring callbacks and one-shot deadline jobs.
//!
//! Each entry is a tokio task. Cancelling aborts it before `cancel` returns,
//! so once an engine operation has cancelled a beat no further invocation of
//! that beat is started. A beat already waiting on the engine lock when it is
//! aborted is dropped at that await point.

use crate::common::HeartbeatId;
use slotmap::SlotMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// A running heartbeat task.
#[derive(Debug)]
pub struct Heartbeat {
    pub label: &'static str,
    handle: JoinHandle<()>,
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Default)]
pub struct HeartbeatRegistry {
    beats: SlotMap<HeartbeatId, Heartbeat>,
}

impl HeartbeatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `callback` every `period`, first firing one period from now.
    ///
    /// Missed ticks are skipped rather than replayed: after a long suspension
    /// the callback runs once and recomputes from absolute timestamps.
    pub fn spawn_every<F, Fut>(
        &mut self,
        label: &'static str,
        period: Duration,
        mut callback: F,
    ) -> HeartbeatId
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                callback().await;
            }
        });
        let id = self.beats.insert(Heartbeat { label, handle });
        debug!(?id, label, ?period, "Heartbeat registered.");
        id
    }

    /// Spawns `job` once after `delay`.
    ///
    /// The finished entry stays registered until cancelled or reaped with
    /// [`HeartbeatRegistry::cancel`], which is harmless for a completed task.
    pub fn spawn_once<Fut>(&mut self, label: &'static str, delay: Duration, job: Fut) -> HeartbeatId
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        });
        let id = self.beats.insert(Heartbeat { label, handle });
        debug!(?id, label, ?delay, "Deadline job registered.");
        id
    }

    /// Aborts and forgets a job. Returns `false` for unknown or stale ids.
    pub fn cancel(&mut self, id: HeartbeatId) -> bool {
        match self.beats.remove(id) {
            Some(beat) => {
                debug!(?id, label = beat.label, "Heartbeat cancelled.");
                true
            }
            None => false,
        }
    }

    /// Cancels `slot`'s job if there is one and clears the slot.
    pub fn cancel_slot(&mut self, slot: &mut Option<HeartbeatId>) -> bool {
        slot.take().is_some_and(|id| self.cancel(id))
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.beats.len();
        self.beats.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Labels of jobs still registered, in no particular order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.beats.values().map(|beat| beat.label).collect()
    }
}
