//! Simulated collaborators shared by the unit tests.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::sync::atomic::{AtomicU64, Ordering};
use std::boxed::Box;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::config::{SofaConfig, TimingConfig};
use crate::driver::SofaMac;
use crate::frame::{self, Address, AddressFramer, Body, Framer, LinkHeader};
use crate::hal::{Application, Outcome, Radio, Watchdog};
use crate::timer::{Clock, SoftTimers, TimerId, TimerService};

/// Check rate used by the simulated nodes: 125 ms period, 625 us on-time.
pub(crate) const TEST_CHECK_RATE: u32 = 8;

/// Frames waiting to be read by a node.
pub(crate) type Inbox = Rc<RefCell<VecDeque<Vec<u8>>>>;

/// Shared clock that moves forward by `step` on every reading.
#[derive(Clone)]
pub(crate) struct SimClock {
    now: Rc<Cell<u64>>,
    step: u64,
}

impl SimClock {
    pub(crate) fn new(step: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            step,
        }
    }

    pub(crate) fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        let now = self.now.get() + self.step;
        self.now.set(now);
        now
    }
}

/// Process-wide clock for tests that need `Send` collaborators.
pub(crate) static STATIC_NOW: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct StaticClock;

impl Clock for StaticClock {
    fn now_us(&self) -> u64 {
        STATIC_NOW.fetch_add(10, Ordering::Relaxed) + 10
    }
}

/// Radio whose transmissions are recorded and optionally handed to a peer.
pub(crate) struct SimRadio {
    pub(crate) on: bool,
    pub(crate) sent: Vec<Vec<u8>>,
    pub(crate) inbox: Inbox,
    pub(crate) peer: Option<Box<dyn FnMut(&[u8])>>,
}

impl SimRadio {
    pub(crate) fn new() -> Self {
        Self {
            on: false,
            sent: Vec::new(),
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            peer: None,
        }
    }

    /// Type byte of every sent frame, assuming an [`AddressFramer`] header.
    pub(crate) fn sent_types(&self) -> Vec<u8> {
        self.sent.iter().map(|f| f[4]).collect()
    }

    pub(crate) fn queue(&self, frame: Vec<u8>) {
        self.inbox.borrow_mut().push_back(frame);
    }
}

impl Radio for SimRadio {
    type Error = Infallible;

    fn on(&mut self) -> Result<(), Self::Error> {
        self.on = true;
        Ok(())
    }

    fn off(&mut self) -> Result<(), Self::Error> {
        self.on = false;
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.sent.push(frame.to_vec());
        if let Some(peer) = self.peer.as_mut() {
            peer(frame);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error> {
        let next = self.inbox.borrow_mut().pop_front();
        match next {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            None => Err(nb::Error::WouldBlock),
        }
    }
}

/// `Send` radio that never receives anything.
#[derive(Default, Debug)]
pub(crate) struct PlainRadio;

impl Radio for PlainRadio {
    type Error = Infallible;

    fn on(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn off(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn send(&mut self, _frame: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn read(&mut self, _buf: &mut [u8]) -> nb::Result<usize, Self::Error> {
        Err(nb::Error::WouldBlock)
    }
}

/// [`AddressFramer`] header padded with filler bytes up to `len`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PaddedFramer {
    pub(crate) len: usize,
}

impl Framer for PaddedFramer {
    fn create(&mut self, header: &LinkHeader, buf: &mut [u8]) -> Option<usize> {
        let out = buf.get_mut(..self.len)?;
        let _ = AddressFramer.create(header, out)?;
        out[4..].fill(0xee);
        Some(self.len)
    }

    fn parse(&mut self, frame: &[u8]) -> Option<(LinkHeader, usize)> {
        let (header, _) = AddressFramer.parse(frame)?;
        if frame.len() < self.len {
            return None;
        }
        Some((header, self.len))
    }
}

/// Application recording everything the MAC tells it.
#[derive(Default, Debug)]
pub(crate) struct Recorder {
    pub(crate) value: u16,
    pub(crate) pulls: usize,
    pub(crate) received: Vec<u16>,
    pub(crate) outcomes: Vec<Outcome>,
}

impl Recorder {
    pub(crate) fn with_value(value: u16) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

impl Application for Recorder {
    fn recv(&mut self, value: u16) {
        self.received.push(value);
    }

    fn pull(&mut self) -> u16 {
        self.pulls += 1;
        self.value
    }

    fn result(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }
}

/// Random source that always yields the same value.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FixedRng(pub(crate) u32);

impl rand_core::RngCore for FixedRng {
    fn next_u32(&mut self) -> u32 {
        self.0
    }

    fn next_u64(&mut self) -> u64 {
        u64::from(self.0)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(self.0 as u8);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[derive(Default, Debug)]
pub(crate) struct CountingWatchdog {
    pub(crate) stops: usize,
    pub(crate) starts: usize,
}

impl Watchdog for CountingWatchdog {
    fn stop(&mut self) {
        self.stops += 1;
    }

    fn start(&mut self) {
        self.starts += 1;
    }
}

pub(crate) type SimMac<F = AddressFramer> =
    SofaMac<SimRadio, F, SoftTimers<SimClock>, FixedRng, Recorder, CountingWatchdog>;

pub(crate) fn addr(n: u8) -> Address {
    Address::new(0, n)
}

pub(crate) fn test_config(n: u8) -> SofaConfig {
    SofaConfig::new(addr(n)).with_timing(TimingConfig::from_check_rate(TEST_CHECK_RATE))
}

/// A node with a bound [`Recorder`] answering `value` when pulled.
pub(crate) fn sim_node_with<F: Framer>(
    framer: F,
    config: SofaConfig,
    clock: &SimClock,
    value: u16,
    rng: u32,
) -> SimMac<F> {
    let mut mac = SofaMac::new(
        SimRadio::new(),
        framer,
        SoftTimers::new(clock.clone()),
        FixedRng(rng),
        CountingWatchdog::default(),
        config,
    );
    let _ = mac.register(Recorder::with_value(value));
    mac
}

pub(crate) fn sim_node(n: u8, clock: &SimClock, value: u16) -> SimMac {
    sim_node_with(AddressFramer, test_config(n), clock, value, 0)
}

/// Builds a raw frame with an [`AddressFramer`] header.
pub(crate) fn raw_frame(sender: Address, receiver: Address, body: Body) -> Vec<u8> {
    let header = LinkHeader { sender, receiver };
    match frame::build(&mut AddressFramer, &header, &body) {
        Ok(frame) => frame.to_vec(),
        Err(e) => panic!("test frame does not fit: {e}"),
    }
}

/// Simulates the expiry of an armed alarm.
pub(crate) fn fire<F: Framer>(mac: &mut SimMac<F>, id: TimerId) {
    assert!(mac.timers.is_armed(id), "{id:?} is not armed");
    mac.timers.cancel(id);
    mac.on_timer(id);
}

/// Connects two nodes: frames sent by `a` reach `b` while its radio is on,
/// frames sent by `b` land in `a`'s inbox.
pub(crate) fn link(a: &mut SimMac, b: &Rc<RefCell<SimMac>>) {
    let a_inbox = Rc::clone(&a.radio.inbox);
    b.borrow_mut().radio.peer = Some(Box::new(move |frame: &[u8]| {
        a_inbox.borrow_mut().push_back(frame.to_vec());
    }));

    let b = Rc::clone(b);
    a.radio.peer = Some(Box::new(move |frame: &[u8]| {
        let mut node = b.borrow_mut();
        if node.is_radio_on() {
            node.on_frame_received(frame);
        }
    }));
}

/// Hands every queued inbound frame to `mac`.
pub(crate) fn drain_inbox(mac: &mut SimMac) {
    loop {
        let next = mac.radio.inbox.borrow_mut().pop_front();
        match next {
            Some(frame) => mac.on_frame_received(&frame),
            None => break,
        }
    }
}
