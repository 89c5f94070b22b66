//! # `ticket-counter`: the Magic Airlines ticket counter
//!
//! A clerk greets the queue, then every ticket is taken and, one second
//! later, completed. The timing is driven by a minimal single-threaded
//! executor: tasks are queued on a per-thread run queue and timers park them
//! until a reactor advances the clock to their deadline.
//!
//! For spawning and managing tasks, refer to the [task] module. The counter
//! itself lives in [counter], and [clock] explains how the same program can
//! run against real time or instantly against simulated time.
//!
//! ## Example
//!
//! This is the default shift, run against a simulated clock:
//!
//! ```
//! use ticket_counter::clock::Clock;
//! use ticket_counter::config::CounterConfig;
//! use ticket_counter::counter::TicketCounter;
//! use ticket_counter::task::Executor;
//!
//! Executor::set_clock(Clock::simulated());
//!
//! let config = CounterConfig::default();
//! let counter = TicketCounter::new(&config, std::io::stdout());
//! counter.open(&config.tickets).unwrap();
//! Executor::run().unwrap();
//! ```
pub mod clock;
pub mod config;
pub mod counter;
pub mod futures;
pub(crate) mod reactor;
pub mod task;
