//! Periodic tick source for the countdown
//!
//! A scheduler hands out tick handles. Each handle drives one periodic
//! trigger and cancels it when dropped, so releasing a handle is just
//! letting go of it.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One firing of a periodic trigger, tagged with the handle that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

/// Creates periodic triggers. Dropping the returned handle must stop the trigger.
pub trait Scheduler {
    type Handle;

    fn schedule(&mut self, period: Duration, generation: u64) -> Self::Handle;
}

/// Scheduler backed by a tokio interval task per handle
pub struct TokioScheduler {
    tx: UnboundedSender<Tick>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its ticks arrive on
    pub fn new() -> (Self, UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Scheduler for TokioScheduler {
    type Handle = IntervalHandle;

    fn schedule(&mut self, period: Duration, generation: u64) -> IntervalHandle {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            // First firing one full period after scheduling
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Tick { generation }).is_err() {
                    // Receiver gone, nobody left to tick for
                    return;
                }
            }
        });
        tracing::debug!(generation, ?period, "tick task scheduled");
        IntervalHandle { generation, task }
    }
}

/// Live reference to a running interval task
#[derive(Debug)]
pub struct IntervalHandle {
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(generation = self.generation, "tick task released");
    }
}

/// Scheduler without real time, for driving the state machine in tests.
/// It only counts how many of its handles are alive.
#[cfg(test)]
pub mod manual {
    use super::Scheduler;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default, Clone)]
    pub struct ManualScheduler {
        live: Rc<Cell<usize>>,
        scheduled: Rc<Cell<usize>>,
    }

    impl ManualScheduler {
        pub fn live(&self) -> usize {
            self.live.get()
        }

        pub fn scheduled(&self) -> usize {
            self.scheduled.get()
        }
    }

    pub struct ManualHandle {
        live: Rc<Cell<usize>>,
    }

    impl Drop for ManualHandle {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    impl Scheduler for ManualScheduler {
        type Handle = ManualHandle;

        fn schedule(&mut self, _period: Duration, _generation: u64) -> ManualHandle {
            self.live.set(self.live.get() + 1);
            self.scheduled.set(self.scheduled.get() + 1);
            ManualHandle {
                live: self.live.clone(),
            }
        }
    }
}
