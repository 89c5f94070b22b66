use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use log::debug;
use ticket_counter::{
    clock::Clock,
    config::CounterConfig,
    counter::{Ticket, TicketCounter},
    task::Executor,
};

/// The Magic Airlines ticket counter.
///
/// Greets the queue and then takes and completes every ticket. With no
/// arguments this runs the usual shift: Jonah Hill serving Channing Tatum and
/// Matt Maconahaney.
#[derive(Parser, Debug)]
struct Args {
    /// Name of the clerk on duty.
    #[arg(long)]
    clerk: Option<String>,

    /// A ticket to process, as ID:CUSTOMER. Repeat to queue several; replaces
    /// the default queue.
    #[arg(long = "ticket", value_name = "ID:CUSTOMER")]
    tickets: Vec<Ticket>,

    /// Milliseconds between a ticket being taken and being completed.
    #[arg(long, value_name = "MS")]
    completion_delay_ms: Option<u64>,

    /// Run against a simulated clock, finishing instantly.
    #[arg(long)]
    simulated: bool,

    /// Write announcements to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> CounterConfig {
        let mut config = CounterConfig::default();

        if let Some(clerk) = &self.clerk {
            config.clerk = clerk.clone();
        }

        if !self.tickets.is_empty() {
            config.tickets = self.tickets.clone();
        }

        if let Some(ms) = self.completion_delay_ms {
            config.completion_delay = Duration::from_millis(ms);
        }

        config
    }
}

fn run_shift(config: &CounterConfig, out: impl Write + 'static) -> anyhow::Result<()> {
    let counter = TicketCounter::new(config, out);
    let handles = counter
        .open(&config.tickets)
        .context("Could not greet the queue")?;

    Executor::run().context("Executor failed")?;

    for handle in handles {
        let id = handle.id();
        let ticket = handle
            .join()
            .with_context(|| format!("Could not process ticket {id}"))?;
        debug!("ticket {} for {} done", ticket.id, ticket.customer);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = args.config();

    if args.simulated {
        Executor::set_clock(Clock::simulated());
    }

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Could not create {}", path.display()))?;
            run_shift(&config, file)
        }
        None => run_shift(&config, io::stdout()),
    }
}
