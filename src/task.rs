//! Task and execution management
//!
//! This module provides the methods needed to spawn tasks and execute them
//! until completion. The executor is per-thread: each OS thread has its own
//! run queue, set of waiting tasks and timer reactor. This means that:
//!
//! 1. The thread upon which a task is spawned is the same thread that will
//!    execute it.
//! 2. Each thread needs to call one of [Executor::block_on] or [Executor::run]
//!    to do any work. Use the former if you want to run a single top-level
//!    task, or the latter if you wish to run multiple top-level tasks.
//!
//! Runnable tasks are polled in the order they became runnable. Two tasks
//! spawned back to back therefore start in spawn order, and two timers with
//! the same deadline wake their tasks in the order the timers were armed.
//!
//! # Example
//!
//! Here is a simple hello world using [Executor::block_on].
//!
//! ```
//! use ticket_counter::task::Executor;
//! Executor::block_on(async { println!("Hello, world!"); }).unwrap();
//! ```
//!
//! You can also use [Executor::block_on] to easily obtain the result of a
//! future:
//!
//! ```
//! use ticket_counter::task::Executor;
//! let x = Executor::block_on(async { 2 + 8 }).unwrap();
//! assert_eq!(x, 10);
//! ```
//!
//! # Threading Model
//!
//! Since each thread has its own execution state, only a single task is ever
//! executing at once. This allows for `!Send` futures to be executed:
//!
//! ```
//! use ticket_counter::task::Executor;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! let cell = Rc::new(RefCell::new(0));
//! {
//!     let cell = cell.clone();
//!     Executor::spawn(async move { *cell.borrow_mut() += 10 });
//! }
//! {
//!     let cell = cell.clone();
//!     Executor::spawn(async move { *cell.borrow_mut() += 10 });
//! }
//! Executor::run().unwrap();
//! assert_eq!(*cell.borrow(), 20);
//! ```
use std::{
    cell::RefCell,
    collections::VecDeque,
    future::Future,
    io::{Error, Result},
    pin::Pin,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll, Wake, Waker},
    time::Duration,
};

use log::{debug, trace};
use slab::Slab;

use crate::{clock::Clock, reactor::Reactor};

const NOT_WAITING: usize = usize::MAX;

struct TaskId {
    /// Slab key while the task is parked, [NOT_WAITING] otherwise.
    key: AtomicUsize,
    /// Set when a wakeup arrives while the task is queued or running.
    notified: AtomicBool,
}

impl Wake for TaskId {
    fn wake(self: Arc<TaskId>) {
        self.wake_by_ref()
    }

    fn wake_by_ref(self: &Arc<TaskId>) {
        let key = self.key.swap(NOT_WAITING, Ordering::Relaxed);

        if key == NOT_WAITING {
            self.notified.store(true, Ordering::Relaxed);
            return;
        }

        EXEC.with(|exec| {
            let mut exec = exec.borrow_mut();
            if let Some(task) = exec.waiting.try_remove(key) {
                exec.run_q.push_back(task);
            }
        });
    }
}

struct Task {
    id: Arc<TaskId>,
    future: Pin<Box<dyn Future<Output = ()>>>,
}

/// The async executor.
///
/// A type that is responsible for pushing futures through to
/// completion. You can begin execution of a new task by calling the
/// [Executor::block_on] function.
pub struct Executor {
    waiting: Slab<Task>,
    run_q: VecDeque<Task>,
}

thread_local! {
    static EXEC: RefCell<Executor> = const { RefCell::new(
        Executor {
            waiting: Slab::new(),
            run_q: VecDeque::new(),
        }
    )}
}

struct JoinSlot<T> {
    value: Option<T>,
    waiter: Option<Waker>,
}

/// A handle to a running task.
///
/// You can call [TaskJoiner::join] from a synchronous context to block
/// execution and yield the future's value. If you want to wait for execution to
/// finish from an asynchronous context, use `.await` on the joiner. If the
/// joiner is dropped then execution of the future continues to completion but
/// the return value is lost, aka detach-on-drop.
pub struct TaskJoiner<T> {
    slot: Rc<RefCell<JoinSlot<T>>>,
}

impl<T> TaskJoiner<T> {
    /// Block execution and wait for a task to finish executing. The return
    /// value `T` is the value yielded by the task's future.
    ///
    /// If the task has not finished yet, this drives the executor until every
    /// task on this thread has run to completion.
    ///
    /// *Note* This function should only be called from synchronous contexts.
    /// In an asynchronous context, use `.await` instead.
    pub fn join(self) -> Result<T> {
        if self.slot.borrow().value.is_none() {
            Executor::executor_loop()?;
        }

        self.slot
            .borrow_mut()
            .value
            .take()
            .ok_or_else(|| Error::other("task did not run to completion"))
    }

    /// Whether the task has finished and its value is waiting to be taken.
    pub fn is_finished(&self) -> bool {
        self.slot.borrow().value.is_some()
    }
}

impl<T> Future for TaskJoiner<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();

        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.waiter = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Executor {
    /// Spawn a new future and add it to the back of this thread's run queue.
    /// If called from an already-running asynchronous task, the future will be
    /// queued for execution. If called from a synchronous context, the task
    /// will *not* be executed until [Executor::run] is called.
    ///
    /// A [TaskJoiner] is returned which can be used to wait for completion of
    /// the future `f` and obtain its return value.
    pub fn spawn<Fut, T>(f: Fut) -> TaskJoiner<T>
    where
        Fut: Future<Output = T> + 'static,
        T: 'static,
    {
        let slot = Rc::new(RefCell::new(JoinSlot {
            value: None,
            waiter: None,
        }));
        let task_slot = slot.clone();

        let fut = async move {
            let value = f.await;
            let waiter = {
                let mut slot = task_slot.borrow_mut();
                slot.value = Some(value);
                slot.waiter.take()
            };

            if let Some(waiter) = waiter {
                waiter.wake();
            }
        };

        let task = Task {
            id: Arc::new(TaskId {
                key: AtomicUsize::new(NOT_WAITING),
                notified: AtomicBool::new(false),
            }),
            future: Box::pin(fut),
        };

        EXEC.with(|exec| {
            let mut exec = exec.borrow_mut();
            exec.run_q.push_back(task);
            trace!("spawned task, {} runnable", exec.run_q.len());
        });

        TaskJoiner { slot }
    }

    /// A convenience function for waiting on a future from a synchronous
    /// context. This is the equivalent of calling:
    ///
    /// ```
    /// # use ticket_counter::task::Executor;
    /// # use std::future::Future;
    /// # fn x<Fut: Future<Output = ()> + 'static>(f: Fut) -> std::io::Result<()> {
    /// let task = Executor::spawn(f);
    /// Executor::run()?;
    /// task.join()
    /// # }
    /// ```
    pub fn block_on<Fut, T>(f: Fut) -> Result<T>
    where
        Fut: Future<Output = T> + 'static,
        T: 'static,
    {
        let joiner = Self::spawn(f);

        Self::executor_loop()?;

        joiner.join()
    }

    /// Run the executor for this thread.
    ///
    /// This function will schedule and run all tasks that have been previously
    /// spawned with [Executor::spawn]. *Note* each thread has its own set of
    /// tasks and execution environment. If you call this function, only tasks
    /// that have been spawned on *this* thread will be executed.
    ///
    /// Blocks until all tasks have finished executing. Fails if the remaining
    /// tasks are all parked and nothing is left that could wake them.
    pub fn run() -> Result<()> {
        Self::executor_loop()
    }

    /// Replace this thread's clock.
    ///
    /// Call this before spawning any timers; deadlines already armed were
    /// computed against the previous clock.
    pub fn set_clock(clock: Clock) {
        Reactor::set_clock(clock)
    }

    /// Current time on this thread's clock.
    pub fn elapsed() -> Duration {
        Reactor::now()
    }

    fn executor_loop() -> Result<()> {
        debug!("running executor loop");

        EXEC.with(|exec| loop {
            let next = exec.borrow_mut().run_q.pop_front();

            let Some(mut task) = next else {
                if exec.borrow().waiting.is_empty() {
                    debug!("no runnable or waiting tasks left");
                    return Ok(());
                }

                Reactor::react()?;
                continue;
            };

            task.id.notified.store(false, Ordering::Relaxed);

            let waker = Waker::from(task.id.clone());

            let mut cx = Context::from_waker(&waker);

            match task.future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => trace!("task finished"),
                Poll::Pending => {
                    let mut exec = exec.borrow_mut();

                    if task.id.notified.swap(false, Ordering::Relaxed) {
                        exec.run_q.push_back(task);
                        continue;
                    }

                    let slot = exec.waiting.vacant_entry();

                    task.id.key.store(slot.key(), Ordering::Relaxed);

                    slot.insert(task);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        future::{pending, poll_fn},
        rc::Rc,
        task::Poll,
        time::Duration,
    };

    use crate::{clock::Clock, futures::timer::Timer};

    use super::Executor;

    #[test]
    fn tasks_start_in_spawn_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            Executor::spawn(async move { order.borrow_mut().push(i) });
        }

        Executor::run().unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn block_on_returns_value() {
        assert_eq!(Executor::block_on(async { "done" }).unwrap(), "done");
    }

    #[test]
    fn subtask_spawned_inside_task() {
        Executor::set_clock(Clock::simulated());

        let outer = Executor::spawn(async {
            Timer::sleep(Duration::ZERO).await;

            let inner = Executor::spawn(async {
                Timer::sleep(Duration::from_millis(1000)).await;
                24
            });

            (Executor::elapsed(), inner)
        });

        let (spawned_at, inner) = outer.join().unwrap();
        assert_eq!(spawned_at, Duration::ZERO);
        assert_eq!(inner.join().unwrap(), 24);
        assert_eq!(Executor::elapsed(), Duration::from_millis(1000));
    }

    #[test]
    fn joiner_awaited_from_other_task() {
        Executor::set_clock(Clock::simulated());

        let result = Executor::block_on(async {
            let t = Executor::spawn(async {
                Timer::sleep(Duration::from_millis(10)).await;
                7
            });

            t.await * 6
        })
        .unwrap();

        assert_eq!(result, 42);
    }

    #[test]
    fn self_wake_requeues_task() {
        let mut polls = 0;

        Executor::block_on(poll_fn(move |cx| {
            polls += 1;
            if polls == 3 {
                Poll::Ready(())
            } else {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }))
        .unwrap();
    }

    #[test]
    fn parked_forever_is_an_error() {
        Executor::spawn(pending::<()>());

        let err = Executor::run().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    }

    #[test]
    fn finished_joiner_reports_done() {
        let t = Executor::spawn(async { 1 });
        assert!(!t.is_finished());

        Executor::run().unwrap();
        assert!(t.is_finished());
        assert_eq!(t.join().unwrap(), 1);
    }
}
