//! Async timer related futures.
//!
//! A [Timer] is the building block for deferred work: it completes once the
//! executor's clock has reached a deadline fixed when the timer was created,
//! much like scheduling a delayed callback. The executor's thread-local
//! reactor keeps all armed deadlines and, whenever no task is runnable,
//! advances the clock to the earliest one and wakes the tasks waiting on it.
//!
//! # Example
//! Let's put a task to sleep for 2 seconds.
//! ```
//! use ticket_counter::futures::timer::Timer;
//! use ticket_counter::task::Executor;
//! use std::time::{Duration, Instant};
//!# Executor::block_on(
//! async {
//!     let now = Instant::now();
//!
//!     Timer::sleep(Duration::from_secs(2)).await;
//!
//!     assert!(now.elapsed() > Duration::from_secs(2));
//! }
//!# ).unwrap();
//! ```
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use crate::reactor::Reactor;

#[derive(Debug)]
enum TimerState {
    New,
    Armed(usize),
    Finished,
}

/// Asynchronous timer.
///
/// This structure is a future that will expire at some point in the future. It
/// can be obtained via the [Timer::sleep] function.
#[derive(Debug)]
pub struct Timer {
    expiration: Duration,
    state: TimerState,
}

impl Timer {
    #[must_use]
    /// Put the current task to sleep for the specified duration.
    ///
    /// The deadline is taken from the executor's clock when this function is
    /// called, not when the future is first polled. It is guaranteed that the
    /// task will be suspended for *at least* the specified duration; it could
    /// sleep for longer. A zero duration still round-trips through the
    /// reactor, so the task yields to every task queued ahead of it.
    pub fn sleep(d: Duration) -> Self {
        Self {
            expiration: Reactor::now() + d,
            state: TimerState::New,
        }
    }

    /// The point on the executor's clock at which this timer fires.
    pub fn deadline(&self) -> Duration {
        self.expiration
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.state {
            TimerState::New => {
                let slot = Reactor::arm(self.expiration, cx.waker().clone());
                self.state = TimerState::Armed(slot);
                Poll::Pending
            }
            TimerState::Armed(slot) => {
                if Reactor::poll_slot(slot, cx.waker()) {
                    self.state = TimerState::Finished;
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            }
            TimerState::Finished => Poll::Ready(()),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let TimerState::Armed(slot) = self.state {
            Reactor::cancel(slot);
        }
    }
}
