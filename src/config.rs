//! Counter configuration.
//!
//! [CounterConfig::default] is the Magic Airlines morning shift: Jonah Hill
//! at the desk and two tickets in the queue. The binary starts from this and
//! lets individual values be overridden on the command line.
use std::time::Duration;

use crate::counter::Ticket;

/// Delay before a ticket is announced as taken.
pub const TAKE_DELAY: Duration = Duration::ZERO;

/// Delay between a ticket being taken and it being completed.
pub const COMPLETION_DELAY: Duration = Duration::from_millis(1000);

/// Everything a [TicketCounter](crate::counter::TicketCounter) needs at
/// startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    pub clerk: String,
    pub tickets: Vec<Ticket>,
    pub take_delay: Duration,
    pub completion_delay: Duration,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            clerk: "Jonah Hill".to_string(),
            tickets: vec![
                Ticket::new(1, "Channing Tatum"),
                Ticket::new(2, "Matt Maconahaney"),
            ],
            take_delay: TAKE_DELAY,
            completion_delay: COMPLETION_DELAY,
        }
    }
}
