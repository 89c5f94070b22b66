//! The Magic Airlines ticket counter.
//!
//! A [TicketCounter] greets customers on behalf of its clerk and then works
//! through tickets. Each ticket moves through [TicketState::Pending],
//! [TicketState::Taken] and [TicketState::Completed], driven only by time:
//!
//! 1. [TicketCounter::take_ticket] spawns a task that waits for the take
//!    delay (zero by default) and announces the ticket as taken.
//! 2. Only once that announcement has been made does the task schedule a
//!    second task, which waits for the completion delay (one second by
//!    default) and announces the ticket as completed.
//!
//! A ticket can therefore never be completed before it has been taken. Across
//! tickets the executor runs tasks in the order they became runnable, so
//! tickets with equal delays are announced in the order they were taken.
//!
//! # Example
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
//! let counter = TicketCounter::new(&config, Vec::new());
//! let handles = counter.open(&config.tickets).unwrap();
//!
//! Executor::run().unwrap();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! let out = String::from_utf8(counter.output().clone()).unwrap();
//! assert!(out.starts_with("Welcome to Magic Airlines.  Our active clerk is Jonah Hill\n"));
//! ```
use std::{
    cell::{Ref, RefCell},
    io::{Error, Result, Write},
    num::ParseIntError,
    rc::Rc,
    str::FromStr,
    time::Duration,
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    config::CounterConfig,
    futures::timer::Timer,
    task::{Executor, TaskJoiner},
};

/// One customer's visit to the counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: u32,
    pub customer: String,
}

impl Ticket {
    pub fn new(id: u32, customer: impl Into<String>) -> Self {
        Self {
            id,
            customer: customer.into(),
        }
    }
}

/// Error returned when parsing a [Ticket] from `ID:CUSTOMER`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTicketError {
    #[error("expected ID:CUSTOMER")]
    MissingSeparator,
    #[error("invalid ticket id: {0}")]
    InvalidId(#[source] ParseIntError),
    #[error("customer name is empty")]
    EmptyCustomer,
}

impl FromStr for Ticket {
    type Err = ParseTicketError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (id, customer) = s
            .split_once(':')
            .ok_or(ParseTicketError::MissingSeparator)?;

        let id = id.trim().parse().map_err(ParseTicketError::InvalidId)?;
        let customer = customer.trim();

        if customer.is_empty() {
            return Err(ParseTicketError::EmptyCustomer);
        }

        Ok(Ticket::new(id, customer))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    Pending,
    Taken,
    Completed,
}

/// A ticket entering a state at a point on the executor's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: Duration,
    pub ticket: u32,
    pub state: TicketState,
}

pub fn welcome_banner(clerk: &str) -> String {
    format!("Welcome to Magic Airlines.  Our active clerk is {clerk}")
}

pub fn taken_message(ticket: &Ticket) -> String {
    format!("ticket with id {} taken", ticket.id)
}

pub fn completed_message(ticket: &Ticket) -> String {
    format!(
        "Ticket with {} completed.  Thanks for choosing to fly with Magic Airlines",
        ticket.customer
    )
}

/// The counter's shared output and journal, cloned into every ticket task.
struct Desk<W> {
    out: Rc<RefCell<W>>,
    journal: Rc<RefCell<Vec<Transition>>>,
}

impl<W> Clone for Desk<W> {
    fn clone(&self) -> Self {
        Self {
            out: self.out.clone(),
            journal: self.journal.clone(),
        }
    }
}

impl<W: Write> Desk<W> {
    fn announce(&self, line: &str) -> Result<()> {
        let mut out = self.out.borrow_mut();
        writeln!(out, "{line}")?;
        out.flush()
    }

    fn record(&self, ticket: u32, state: TicketState) {
        let at = Executor::elapsed();
        debug!("ticket {ticket} is {state:?} at {at:?}");
        self.journal.borrow_mut().push(Transition { at, ticket, state });
    }
}

type Completion = TaskJoiner<Result<Ticket>>;

/// Handle to a ticket being processed.
///
/// Dropping the handle does not stop the ticket; it is still taken and
/// completed when the executor runs.
pub struct TicketHandle {
    id: u32,
    taken: TaskJoiner<Result<Completion>>,
}

impl TicketHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Wait for the ticket to be completed, driving the executor if needed.
    ///
    /// Fails if either announcement could not be written.
    pub fn join(self) -> Result<Ticket> {
        let completion = self.taken.join()??;
        completion.join()?
    }
}

/// A ticket counter staffed by a single clerk.
///
/// See the [module-level documentation](self) for more information.
pub struct TicketCounter<W> {
    clerk: String,
    take_delay: Duration,
    completion_delay: Duration,
    desk: Desk<W>,
}

impl<W: Write + 'static> TicketCounter<W> {
    /// Staff a counter from `config`, announcing to `out`.
    ///
    /// Only the clerk and delays are taken from `config`; tickets are handed
    /// over separately through [TicketCounter::open] or
    /// [TicketCounter::take_ticket].
    pub fn new(config: &CounterConfig, out: W) -> Self {
        Self {
            clerk: config.clerk.clone(),
            take_delay: config.take_delay,
            completion_delay: config.completion_delay,
            desk: Desk {
                out: Rc::new(RefCell::new(out)),
                journal: Rc::new(RefCell::new(Vec::new())),
            },
        }
    }

    pub fn welcome(&self) -> Result<()> {
        self.desk.announce(&welcome_banner(&self.clerk))
    }

    /// Schedule `ticket` to be taken and then completed.
    ///
    /// Nothing is printed until the executor runs.
    pub fn take_ticket(&self, ticket: Ticket) -> TicketHandle {
        let id = ticket.id;
        let desk = self.desk.clone();
        let completion_delay = self.completion_delay;
        let taken = Timer::sleep(self.take_delay);

        desk.record(id, TicketState::Pending);

        let task = Executor::spawn(async move {
            taken.await;

            desk.announce(&taken_message(&ticket))?;
            desk.record(ticket.id, TicketState::Taken);

            let completed = Timer::sleep(completion_delay);

            Ok::<_, Error>(Executor::spawn(async move {
                completed.await;

                desk.announce(&completed_message(&ticket))?;
                desk.record(ticket.id, TicketState::Completed);

                Ok::<_, Error>(ticket)
            }))
        });

        TicketHandle { id, taken: task }
    }

    /// Greet customers and take every ticket, in order.
    pub fn open(&self, tickets: &[Ticket]) -> Result<Vec<TicketHandle>> {
        info!(
            "opening counter with {} ticket(s), clerk {}",
            tickets.len(),
            self.clerk
        );

        self.welcome()?;

        Ok(tickets
            .iter()
            .cloned()
            .map(|ticket| self.take_ticket(ticket))
            .collect())
    }

    /// Every state change so far, in the order it happened.
    pub fn journal(&self) -> Vec<Transition> {
        self.desk.journal.borrow().clone()
    }

    pub fn output(&self) -> Ref<'_, W> {
        self.desk.out.borrow()
    }
}
