use std::{
    cell::RefCell,
    cmp::Reverse,
    collections::BinaryHeap,
    io::{Error, ErrorKind, Result},
    task::Waker,
    time::Duration,
};

use log::{debug, trace};
use slab::Slab;

use crate::clock::Clock;

pub(crate) struct Reactor {}

thread_local! {
    static REACTOR: RefCell<ReactorInner> = RefCell::new(ReactorInner::new(Clock::system()));
}

impl Reactor {
    pub fn now() -> Duration {
        REACTOR.with(|r| r.borrow().clock.now())
    }

    pub fn set_clock(clock: Clock) {
        REACTOR.with(|r| r.borrow_mut().clock = clock)
    }

    pub fn arm(deadline: Duration, waker: Waker) -> usize {
        REACTOR.with(|r| r.borrow_mut().arm(deadline, waker))
    }

    pub fn poll_slot(slot: usize, waker: &Waker) -> bool {
        REACTOR.with(|r| r.borrow_mut().poll_slot(slot, waker))
    }

    pub fn cancel(slot: usize) {
        // Ignore the reactor having been torn down at thread exit.
        let _ = REACTOR.try_with(|r| r.borrow_mut().cancel(slot));
    }

    pub fn react() -> Result<()> {
        let wakers = REACTOR.with(|r| r.borrow_mut().react())?;

        for waker in wakers.into_iter() {
            waker.wake();
        }

        Ok(())
    }
}

#[derive(Debug)]
enum TimerSlot {
    Armed(Waker),
    Fired,
    Dropped,
}

/// (deadline, arm sequence, slot). The sequence number keeps equal deadlines
/// firing in the order they were armed.
type Deadline = Reverse<(Duration, u64, usize)>;

struct ReactorInner {
    clock: Clock,
    deadlines: BinaryHeap<Deadline>,
    slots: Slab<TimerSlot>,
    seq: u64,
}

impl ReactorInner {
    fn new(clock: Clock) -> Self {
        Self {
            clock,
            deadlines: BinaryHeap::new(),
            slots: Slab::new(),
            seq: 0,
        }
    }

    fn arm(&mut self, deadline: Duration, waker: Waker) -> usize {
        let slot = self.slots.insert(TimerSlot::Armed(waker));

        self.deadlines.push(Reverse((deadline, self.seq, slot)));
        self.seq += 1;

        trace!("armed timer slot {slot} for {deadline:?}");

        slot
    }

    fn poll_slot(&mut self, slot: usize, waker: &Waker) -> bool {
        match self.slots.get_mut(slot) {
            Some(TimerSlot::Fired) => {
                self.slots.remove(slot);
                true
            }
            Some(TimerSlot::Armed(w)) => {
                if !w.will_wake(waker) {
                    *w = waker.clone();
                }
                false
            }
            Some(TimerSlot::Dropped) | None => {
                panic!("polled a timer slot that is no longer owned")
            }
        }
    }

    fn cancel(&mut self, slot: usize) {
        match self.slots.get_mut(slot) {
            Some(TimerSlot::Fired) => {
                self.slots.remove(slot);
            }
            Some(entry @ TimerSlot::Armed(_)) => *entry = TimerSlot::Dropped,
            Some(TimerSlot::Dropped) | None => {}
        }
    }

    /// Drop heap entries for timers whose owner has gone away.
    fn discard_dropped(&mut self) {
        while let Some(Reverse((_, _, slot))) = self.deadlines.peek().copied() {
            if !matches!(self.slots.get(slot), Some(TimerSlot::Dropped)) {
                break;
            }

            self.deadlines.pop();
            self.slots.remove(slot);
        }
    }

    fn react(&mut self) -> Result<Vec<Waker>> {
        self.discard_dropped();

        let Some(Reverse((deadline, _, _))) = self.deadlines.peek().copied() else {
            return Err(Error::new(
                ErrorKind::WouldBlock,
                "tasks are waiting but no timers are armed",
            ));
        };

        debug!("reactor sleeping until {deadline:?}");
        self.clock.advance_to(deadline)?;

        let now = self.clock.now();
        let mut wakers = Vec::new();

        while let Some(Reverse((deadline, _, slot))) = self.deadlines.peek().copied() {
            if deadline > now {
                break;
            }

            self.deadlines.pop();

            match std::mem::replace(&mut self.slots[slot], TimerSlot::Fired) {
                TimerSlot::Armed(waker) => wakers.push(waker),
                TimerSlot::Dropped => {
                    self.slots.remove(slot);
                }
                TimerSlot::Fired => unreachable!("timer slot fired twice"),
            }
        }

        trace!("reactor woke {} timer(s) at {now:?}", wakers.len());

        Ok(wakers)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        task::{Wake, Waker},
        time::Duration,
    };

    use super::ReactorInner;
    use crate::clock::Clock;

    struct Recorder {
        id: u32,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl Wake for Recorder {
        fn wake(self: Arc<Self>) {
            self.log.lock().unwrap().push(self.id);
        }
    }

    fn waker(id: u32, log: &Arc<Mutex<Vec<u32>>>) -> Waker {
        Waker::from(Arc::new(Recorder {
            id,
            log: log.clone(),
        }))
    }

    fn run_test(f: impl FnOnce(&mut ReactorInner, &Arc<Mutex<Vec<u32>>>)) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reactor = ReactorInner::new(Clock::simulated());

        f(&mut reactor, &log);
    }

    fn wake_all(reactor: &mut ReactorInner) {
        for w in reactor.react().unwrap() {
            w.wake();
        }
    }

    #[test]
    fn earliest_deadline_fires_first() {
        run_test(|reactor, log| {
            reactor.arm(Duration::from_millis(1000), waker(1, log));
            reactor.arm(Duration::from_millis(10), waker(2, log));

            wake_all(reactor);
            assert_eq!(*log.lock().unwrap(), vec![2]);
            assert_eq!(reactor.clock.now(), Duration::from_millis(10));

            wake_all(reactor);
            assert_eq!(*log.lock().unwrap(), vec![2, 1]);
            assert_eq!(reactor.clock.now(), Duration::from_millis(1000));
        });
    }

    #[test]
    fn equal_deadlines_fire_in_arm_order() {
        run_test(|reactor, log| {
            for id in 1..=4 {
                reactor.arm(Duration::from_millis(1000), waker(id, log));
            }

            wake_all(reactor);
            assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4]);
        });
    }

    #[test]
    fn fired_slot_is_released_on_poll() {
        run_test(|reactor, log| {
            let w = waker(1, log);
            let slot = reactor.arm(Duration::ZERO, w.clone());

            assert!(!reactor.poll_slot(slot, &w));
            wake_all(reactor);
            assert!(reactor.poll_slot(slot, &w));
            assert!(reactor.slots.is_empty());
        });
    }

    #[test]
    fn cancelled_timer_never_wakes() {
        run_test(|reactor, log| {
            let slot = reactor.arm(Duration::from_millis(5), waker(1, log));
            reactor.arm(Duration::from_millis(50), waker(2, log));
            reactor.cancel(slot);

            wake_all(reactor);
            assert_eq!(*log.lock().unwrap(), vec![2]);
            assert_eq!(reactor.clock.now(), Duration::from_millis(50));
        });
    }

    #[test]
    fn react_without_timers_is_an_error() {
        run_test(|reactor, _| {
            let err = reactor.react().unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
        });
    }
}
