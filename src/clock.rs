//! Time sources for the executor.
//!
//! The reactor never reads the wall clock directly. Instead it asks a
//! [Clock] what time it is and to block until the next timer deadline. Two
//! clocks are provided:
//!
//! - [Clock::system] measures real monotonic time and blocks on a Linux
//!   [timerfd](https://man7.org/linux/man-pages/man2/timerfd_create.2.html).
//! - [Clock::simulated] keeps virtual time. Blocking until a deadline simply
//!   moves virtual time forward, so a program full of one-second sleeps runs
//!   instantly while still observing the same ordering.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use ticket_counter::clock::Clock;
//!
//! let clock = Clock::simulated();
//! clock.advance_to(Duration::from_secs(5)).unwrap();
//! assert_eq!(clock.now(), Duration::from_secs(5));
//! ```
use std::{
    cell::Cell,
    io::Result,
    os::fd::{AsRawFd, FromRawFd, OwnedFd},
    ptr::null_mut,
    time::{Duration, Instant},
};

/// A source of monotonic time, measured from the clock's own epoch.
#[derive(Debug)]
pub enum Clock {
    /// Real time, starting at the instant the clock was created.
    System { epoch: Instant },
    /// Virtual time, starting at zero.
    Simulated { now: Cell<Duration> },
}

impl Clock {
    pub fn system() -> Self {
        Self::System {
            epoch: Instant::now(),
        }
    }

    pub fn simulated() -> Self {
        Self::Simulated {
            now: Cell::new(Duration::ZERO),
        }
    }

    /// Time elapsed since this clock's epoch.
    pub fn now(&self) -> Duration {
        match self {
            Clock::System { epoch } => epoch.elapsed(),
            Clock::Simulated { now } => now.get(),
        }
    }

    /// Block until `deadline` has been reached.
    ///
    /// Deadlines in the past return immediately; time never moves backwards.
    pub fn advance_to(&self, deadline: Duration) -> Result<()> {
        match self {
            Clock::System { .. } => {
                let now = self.now();
                if deadline > now {
                    block_for(deadline - now)?;
                }
                Ok(())
            }
            Clock::Simulated { now } => {
                if deadline > now.get() {
                    now.set(deadline);
                }
                Ok(())
            }
        }
    }
}

fn block_for(d: Duration) -> Result<()> {
    let fd = unsafe { libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_CLOEXEC) };

    if fd == -1 {
        return Err(std::io::Error::last_os_error());
    }

    let fd = unsafe { OwnedFd::from_raw_fd(fd) };
    let mut tspec = unsafe { std::mem::zeroed::<libc::itimerspec>() };

    tspec.it_value.tv_sec = d.as_secs() as _;
    tspec.it_value.tv_nsec = d.subsec_nanos() as _;

    // An all-zero it_value disarms the timer, which would block forever.
    if tspec.it_value.tv_sec == 0 && tspec.it_value.tv_nsec == 0 {
        tspec.it_value.tv_nsec = 1;
    }

    let ret = unsafe { libc::timerfd_settime(fd.as_raw_fd(), 0, &tspec as *const _, null_mut()) };

    if ret == -1 {
        return Err(std::io::Error::last_os_error());
    }

    let mut expirations = 0u64;

    loop {
        let ret = unsafe {
            libc::read(
                fd.as_raw_fd(),
                &mut expirations as *mut u64 as *mut _,
                std::mem::size_of::<u64>(),
            )
        };

        if ret != -1 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
