//! SOFA duty-cycled MAC driver.
//!
//! This module provides the [`SofaMac`] struct, which runs the complete SOFA
//! protocol for one node: the radio duty cycle, the initiator's strobe burst
//! and value push, and the responder's acknowledgment and value reply.
//!
//! The driver is passive. The host feeds it three kinds of events, one at a
//! time and each to completion:
//!
//! - [`transmit()`](SofaMac::transmit) from the application
//! - [`on_frame_received()`](SofaMac::on_frame_received) for every frame the radio hears
//! - [`on_timer()`](SofaMac::on_timer) when one of its alarms expires
//!
//! With [`SoftTimers`](crate::timer::SoftTimers), [`poll()`](SofaMac::poll)
//! does both of the last two.
//!
//! ## Exchange
//!
//! ```text
//!  initiator (A)                         responder (B)
//!  transmit(v_a) -> WaitToSend
//!  backoff expires
//!  Strobe ... Strobe  ------------->     Idle, radio on
//!                     <-------------     StrobeAck         -> WaitMasterPacket
//!  DataM(v_a, dst=B)  ------------->     recv(v_a), pull() -> v_b
//!                     <-------------     DataS(v_b, dst=A) -> WaitMasterPacketAck
//!  recv(v_b)
//!  DataAck            ------------->     result(Success)   -> Idle
//!  result(Success) -> Idle
//! ```
//!
//! Every failure returns the node to [`State::Idle`] with the radio off. The
//! protocol never retries; the application decides when to call
//! [`transmit()`](SofaMac::transmit) again.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sofamac::config::SofaConfig;
//! use sofamac::driver::SofaMac;
//! use sofamac::frame::{Address, AddressFramer};
//! use sofamac::hal::NoWatchdog;
//! use sofamac::timer::SoftTimers;
//!
//! let config = SofaConfig::new(Address::new(0, 1));
//! let mut mac = SofaMac::new(radio, AddressFramer, SoftTimers::new(clock), rng, NoWatchdog, config);
//! mac.register(app);
//! mac.init();
//!
//! loop {
//!     while mac.poll() {}
//!     if time_to_gossip() {
//!         let _ = mac.transmit(value);
//!     }
//! }
//! ```

use rand_core::RngCore;

use crate::config::{BusyPolicy, SofaConfig};
use crate::consts::SOFA_RX_BUF_LEN;
use crate::error::MacError;
use crate::frame::{self, Address, Body, Inbound, LinkHeader};
use crate::fsm::{Reaction, State, react};
use crate::hal::{Application, NoWatchdog, Outcome, Radio, Watchdog};
use crate::powercycle::{Phase, PowerCycle};
use crate::timer::{TimerId, TimerService};

/// Counters describing what the MAC has done since construction.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct SofaStats {
    /// Strobes transmitted across all bursts.
    pub strobes_sent: u32,
    /// Exchanges reported as [`Outcome::Success`].
    pub exchanges_ok: u32,
    /// Exchanges reported as [`Outcome::Error`].
    pub exchanges_failed: u32,
    /// Strobe bursts aborted by a collision.
    pub collisions: u32,
    /// Strobe bursts that ran out of time.
    pub no_acks: u32,
    /// Inbound frames that failed to decode.
    pub rx_bad: u32,
}

/// How a strobe burst ended.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
enum Burst {
    Acked(Address),
    Collision,
    Exhausted,
}

/// A SOFA MAC instance for one node.
///
/// `SofaMac` owns the protocol [`State`] and every collaborator it drives:
///
/// - `R`: the radio transceiver ([`Radio`])
/// - `F`: the link header codec ([`Framer`](crate::frame::Framer))
/// - `T`: the alarm service ([`TimerService`])
/// - `N`: the random source used for strobe-ack retransmission ([`RngCore`])
/// - `A`: the bound [`Application`]
/// - `W`: fault supervision suspended during strobe bursts ([`Watchdog`])
///
/// ## Notes
///
/// - A freshly constructed MAC is [`State::Disabled`]; call [`init()`](Self::init).
/// - The strobe burst blocks the caller for up to
///   [`strobe_time`](crate::config::TimingConfig::strobe_time).
/// - If the MAC is shared with interrupt handlers, see [`crate::timer`].
#[derive(Debug)]
pub struct SofaMac<R, F, T, N, A, W = NoWatchdog>
where
    R: Radio,
    F: frame::Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    /// Radio transceiver
    pub radio: R,
    /// Link header codec
    pub framer: F,
    /// Alarm service
    pub timers: T,
    /// Random source
    pub rng: N,
    /// Fault supervision
    pub watchdog: W,
    app: Option<A>,
    config: SofaConfig,
    state: State,
    cycle: PowerCycle,
    radio_on: bool,
    /// Value pushed by the pending or running exchange.
    value: u16,
    stats: SofaStats,
}

impl<R, F, T, N, A, W> SofaMac<R, F, T, N, A, W>
where
    R: Radio,
    F: frame::Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    /// Creates a disabled MAC from its collaborators.
    ///
    /// # Arguments
    /// - `radio`: the transceiver, assumed off
    /// - `framer`: the link header codec
    /// - `timers`: the alarm service
    /// - `rng`: random source for the strobe-ack retransmission draw
    /// - `watchdog`: fault supervision, or [`NoWatchdog`]
    /// - `config`: node address, timing and policies
    pub fn new(radio: R, framer: F, timers: T, rng: N, watchdog: W, config: SofaConfig) -> Self {
        Self {
            radio,
            framer,
            timers,
            rng,
            watchdog,
            app: None,
            config,
            state: State::Disabled,
            cycle: PowerCycle::new(),
            radio_on: false,
            value: 0,
            stats: SofaStats::default(),
        }
    }

    /// Binds the application, returning the previously bound one.
    pub fn register(&mut self, app: A) -> Option<A> {
        self.app.replace(app)
    }

    /// The bound application.
    pub fn application(&self) -> Option<&A> {
        self.app.as_ref()
    }

    /// The bound application, mutably.
    pub fn application_mut(&mut self) -> Option<&mut A> {
        self.app.as_mut()
    }

    /// Current protocol state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Configuration given at construction.
    pub fn config(&self) -> &SofaConfig {
        &self.config
    }

    /// Activity counters.
    pub fn stats(&self) -> SofaStats {
        self.stats
    }

    /// Whether the MAC last switched the radio on.
    pub fn is_radio_on(&self) -> bool {
        self.radio_on
    }

    /// Interval between two channel checks, in microseconds.
    pub fn channel_check_interval(&self) -> u32 {
        self.config.timing.period()
    }

    /// Starts the protocol: the node becomes [`State::Idle`] and the duty
    /// cycle begins with a full off-time.
    pub fn init(&mut self) {
        self.cycle.reset();
        self.set_state(State::Idle);
        self.schedule_power_cycle(self.config.timing.off_time());
        info!("sofamac: init, address {:?}", self.config.address);
    }

    /// Restarts a disabled MAC. Does nothing if it is already running.
    pub fn enable(&mut self) {
        if self.state == State::Disabled {
            self.cycle.reset();
            self.set_state(State::Idle);
            self.schedule_power_cycle(self.config.timing.off_time());
        }
        info!("sofamac: on");
    }

    /// Shuts the MAC down: every alarm is cancelled and the radio forced off.
    ///
    /// # Errors
    /// [`MacError::Radio`] if the radio refused to power down. The MAC is
    /// disabled regardless.
    pub fn disable(&mut self) -> Result<(), MacError> {
        self.set_state(State::Disabled);
        for id in TimerId::ALL {
            self.timers.cancel(id);
        }
        self.radio_on = false;
        info!("sofamac: off");
        self.radio.off().map_err(|_| MacError::Radio)
    }

    /// Starts pushing `value` to whichever neighbor answers first.
    ///
    /// The outcome of the exchange is delivered later through
    /// [`Application::result`]. With the backoff disabled the whole strobe
    /// burst runs before this returns.
    ///
    /// # Errors
    /// [`MacError::NotIdle`] if an exchange is already in progress or the MAC
    /// is disabled. Nothing is queued; try again later.
    pub fn transmit(&mut self, value: u16) -> Result<(), MacError> {
        if self.state != State::Idle {
            debug!("sofamac: transmit rejected in {:?}", self.state);
            return Err(MacError::NotIdle(self.state));
        }
        self.value = value;
        if self.config.use_backoff {
            self.set_state(State::WaitToSend);
            self.power_on();
        } else {
            self.power_on();
            // Failures are reported to the application.
            let _ = self.send_exchange();
        }
        Ok(())
    }

    /// Handles one frame heard by the radio.
    ///
    /// Frames that fail to decode abort any exchange with
    /// [`Outcome::Error`]. Decodable frames are dispatched on the current
    /// state by [`react`].
    pub fn on_frame_received(&mut self, raw: &[u8]) {
        if self.state == State::Disabled {
            trace!("sofamac: disabled, dropping frame");
            return;
        }
        let Some(frame) = Inbound::parse(&mut self.framer, raw) else {
            self.stats.rx_bad = self.stats.rx_bad.saturating_add(1);
            debug!("sofamac: failed to parse ({})", raw.len());
            self.finish(Some(Outcome::Error));
            return;
        };

        if self.state == State::WaitToSend {
            // Someone else is talking: the channel is busy.
            self.timers.cancel(TimerId::Backoff);
            match self.config.busy_policy {
                BusyPolicy::YieldToPeer => {
                    debug!("sofamac: channel busy, giving up the pending push");
                    self.set_state(State::Idle);
                }
                BusyPolicy::SleepOnBusy => {
                    debug!("sofamac: channel busy, sleeping until the next wake-up");
                    self.radio_down();
                    self.report(Outcome::Busy);
                    return;
                }
            }
        }

        match react(self.state, &frame, self.config.address) {
            Reaction::Ignore => trace!("sofamac: stray strobe ack"),
            Reaction::AckStrobe { master } => self.ack_strobe(master),
            Reaction::RepeatStrobeAck { master } => {
                if self.draw_strobe_ack_retx() {
                    debug!("sofamac: strobe ack retransmitted");
                    self.ack_strobe(master);
                } else {
                    // The initiator chose someone else.
                    debug!("sofamac: stray strobe");
                    self.finish(None);
                }
            }
            Reaction::ServeMaster { value, master } => self.serve_master(value, master),
            Reaction::CompleteAsMaster { value, slave } => self.complete_as_master(value, slave),
            Reaction::CompleteAsSlave => {
                debug!("sofamac: got data ack");
                self.finish(Some(Outcome::Success));
            }
            Reaction::Abort { report } => {
                debug!(
                    "sofamac: unexpected frame type {} from {:?} in {:?}",
                    frame.body.frame_type(),
                    frame.header.sender,
                    self.state
                );
                self.finish(report.then_some(Outcome::Error));
            }
        }
    }

    /// Handles the expiry of one of the MAC's alarms.
    ///
    /// Firings that no longer apply to the current state are ignored.
    pub fn on_timer(&mut self, id: TimerId) {
        match id {
            TimerId::IdleTimeout => self.idle_timeout(),
            TimerId::Backoff => {
                if self.state == State::WaitToSend {
                    // Failures are reported to the application.
                    let _ = self.send_exchange();
                } else {
                    trace!("sofamac: stale backoff in {:?}", self.state);
                }
            }
            TimerId::PowerCycle => self.power_cycle(),
        }
    }

    /// Services one pending event: an expired alarm first, otherwise one
    /// frame from the radio if it is on.
    ///
    /// # Returns
    /// `true` if an event was handled; call again until it returns `false`.
    pub fn poll(&mut self) -> bool {
        if let Some(id) = self.timers.take_expired() {
            self.on_timer(id);
            return true;
        }
        if !self.radio_on {
            return false;
        }
        let mut rx = [0u8; SOFA_RX_BUF_LEN];
        match self.radio.read(&mut rx) {
            Ok(0) => false,
            Ok(len) => {
                self.on_frame_received(&rx[..len.min(SOFA_RX_BUF_LEN)]);
                true
            }
            Err(nb::Error::WouldBlock) => false,
            Err(nb::Error::Other(_)) => {
                warn!("sofamac: radio read failed");
                false
            }
        }
    }

    fn set_state(&mut self, next: State) {
        if next != self.state {
            trace!("sofamac: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    /// Ends the current exchange: back to idle, radio off, outcome reported.
    fn finish(&mut self, outcome: Option<Outcome>) {
        self.timers.cancel(TimerId::IdleTimeout);
        self.timers.cancel(TimerId::Backoff);
        self.set_state(State::Idle);
        self.power_off();
        if let Some(outcome) = outcome {
            self.report(outcome);
        }
    }

    fn report(&mut self, outcome: Outcome) {
        let stats = &mut self.stats;
        match outcome {
            Outcome::Success => stats.exchanges_ok = stats.exchanges_ok.saturating_add(1),
            Outcome::Error => stats.exchanges_failed = stats.exchanges_failed.saturating_add(1),
            Outcome::Collision => stats.collisions = stats.collisions.saturating_add(1),
            Outcome::NoAck => stats.no_acks = stats.no_acks.saturating_add(1),
            Outcome::Busy => {}
        }
        if let Some(app) = self.app.as_mut() {
            app.result(outcome);
        }
    }

    fn deliver(&mut self, value: u16) {
        if let Some(app) = self.app.as_mut() {
            app.recv(value);
        }
    }

    fn pull(&mut self) -> u16 {
        self.app.as_mut().map_or(0, |app| app.pull())
    }

    fn draw_strobe_ack_retx(&mut self) -> bool {
        let percent = u32::from(self.config.strobe_ack_retx_percent);
        percent > 0 && self.rng.next_u32() % 100 < percent
    }

    fn radio_up(&mut self) {
        if self.radio.on().is_err() {
            warn!("sofamac: radio failed to power on");
        }
        self.radio_on = true;
    }

    fn radio_down(&mut self) {
        if self.radio.off().is_err() {
            warn!("sofamac: radio failed to power off");
        }
        self.radio_on = false;
    }

    fn send_frame(&mut self, frame: &[u8]) {
        if self.radio.send(frame).is_err() {
            warn!("sofamac: radio send failed ({})", frame.len());
        }
    }

    /// Wakes the radio, arming the backoff if a push is pending.
    fn power_on(&mut self) {
        if self.state == State::Disabled {
            return;
        }
        self.radio_up();
        if self.state == State::WaitToSend && self.config.use_backoff {
            self.timers
                .schedule(TimerId::Backoff, self.config.timing.backoff());
        }
    }

    /// Puts the radio to sleep, but only between exchanges.
    fn power_off(&mut self) {
        if self.state == State::Idle {
            self.radio_down();
        }
    }

    fn schedule_power_cycle(&mut self, after_us: u32) {
        if self.state != State::Disabled {
            self.timers.schedule(TimerId::PowerCycle, after_us);
        }
    }

    fn power_cycle(&mut self) {
        if self.state == State::Disabled {
            return;
        }
        let timing = self.config.timing;
        match self.cycle.advance() {
            Phase::RadioOn => {
                self.power_on();
                self.schedule_power_cycle(timing.on_time());
            }
            Phase::RadioOff => {
                self.power_off();
                self.schedule_power_cycle(timing.off_time());
            }
        }
    }

    fn idle_timeout(&mut self) {
        if !self.state.awaits_peer() {
            trace!("sofamac: idle timeout ignored in {:?}", self.state);
            return;
        }
        // Only the initiator has an attempt outstanding.
        if self.state == State::WaitSlavePacket {
            debug!("sofamac: responder never answered");
            self.finish(Some(Outcome::Error));
        } else {
            debug!("sofamac: initiator never followed up");
            self.finish(None);
        }
    }

    /// Runs the initiator side of an exchange: the strobe burst, then the
    /// value push to the first responder that acknowledged.
    ///
    /// Normally started by the [`TimerId::Backoff`] alarm, or by
    /// [`transmit()`](Self::transmit) when the backoff is disabled. Blocks for
    /// the whole burst with the [`Watchdog`] stopped.
    ///
    /// # Returns
    /// `Ok(())` once the value is sent and the node waits for the reply.
    ///
    /// # Errors
    /// - [`MacError::Collision`] if another frame was heard during the burst
    /// - [`MacError::NoAck`] if nobody acknowledged in time
    /// - [`MacError::FrameTooLarge`] or [`MacError::HeaderEncode`] if a frame
    ///   could not be built
    /// - [`MacError::NotIdle`] if another exchange is running
    ///
    /// All but the last have already been reported to the application.
    pub fn send_exchange(&mut self) -> Result<(), MacError> {
        if !matches!(self.state, State::Idle | State::WaitToSend) {
            return Err(MacError::NotIdle(self.state));
        }
        let header = LinkHeader {
            sender: self.config.address,
            receiver: Address::NULL,
        };
        let strobe = match frame::build(&mut self.framer, &header, &Body::Strobe) {
            Ok(strobe) => strobe,
            Err(e) => {
                error!("sofamac: strobe send failed, {:?}", e);
                self.finish(Some(Outcome::Error));
                return Err(e);
            }
        };

        self.set_state(State::WaitSlaveStrobeAck);
        self.radio_up();
        self.watchdog.stop();
        let burst = self.strobe_burst(&strobe);
        self.watchdog.start();

        match burst {
            Burst::Acked(slave) => self.push_value(slave),
            Burst::Collision => {
                self.finish(Some(Outcome::Collision));
                Err(MacError::Collision)
            }
            Burst::Exhausted => {
                self.finish(Some(Outcome::NoAck));
                Err(MacError::NoAck)
            }
        }
    }

    /// Alternates listen slots and strobes until acked, collided or out of time.
    fn strobe_burst(&mut self, strobe: &[u8]) -> Burst {
        let strobe_time = u64::from(self.config.timing.strobe_time());
        let slot_time = u64::from(self.config.timing.strobe_wait_time());
        let mut rx = [0u8; SOFA_RX_BUF_LEN];
        let mut strobes: u32 = 0;

        let start = self.timers.now_us();
        let burst = 'burst: loop {
            if self.timers.now_us().wrapping_sub(start) >= strobe_time {
                break Burst::Exhausted;
            }
            let slot = self.timers.now_us();
            while self.timers.now_us().wrapping_sub(slot) < slot_time {
                let len = match self.radio.read(&mut rx) {
                    Ok(0) | Err(nb::Error::WouldBlock) => continue,
                    Ok(len) => len.min(SOFA_RX_BUF_LEN),
                    Err(nb::Error::Other(_)) => {
                        warn!("sofamac: radio read failed during strobe burst");
                        continue;
                    }
                };
                if let Some(heard) = self.classify_burst_frame(&rx[..len]) {
                    break 'burst heard;
                }
            }
            self.send_frame(strobe);
            strobes += 1;
        };

        self.stats.strobes_sent = self.stats.strobes_sent.saturating_add(strobes);
        debug!("sofamac: strobe burst ended after {} strobes: {:?}", strobes, burst);
        burst
    }

    /// Classifies a frame heard mid-burst. `None` keeps the burst going.
    fn classify_burst_frame(&mut self, raw: &[u8]) -> Option<Burst> {
        let Some(frame) = Inbound::parse(&mut self.framer, raw) else {
            debug!("sofamac: expected strobe ack, frame failed to parse ({})", raw.len());
            return None;
        };
        match frame.body {
            Body::StrobeAck if frame.header.receiver == self.config.address => {
                self.set_state(State::WaitSlavePacket);
                Some(Burst::Acked(frame.header.sender))
            }
            Body::StrobeAck => {
                debug!("sofamac: strobe ack for {:?}", frame.header.receiver);
                None
            }
            _ => {
                debug!("sofamac: expected strobe ack, got type {}", frame.body.frame_type());
                Some(Burst::Collision)
            }
        }
    }

    /// Sends our value to the responder that acked and waits for its reply.
    fn push_value(&mut self, slave: Address) -> Result<(), MacError> {
        let header = LinkHeader {
            sender: self.config.address,
            receiver: Address::NULL,
        };
        let body = Body::DataM {
            value: self.value,
            dst: slave,
        };
        match frame::build(&mut self.framer, &header, &body) {
            Ok(data) => {
                self.send_frame(&data);
                self.timers
                    .schedule(TimerId::IdleTimeout, self.config.timing.slave_packet_wait());
                debug!("sofamac: sent data to {:?}", slave);
                Ok(())
            }
            Err(e) => {
                error!("sofamac: data send failed, {:?}", e);
                self.finish(Some(Outcome::Error));
                Err(e)
            }
        }
    }

    fn ack_strobe(&mut self, master: Address) {
        let header = LinkHeader {
            sender: self.config.address,
            receiver: master,
        };
        match frame::build(&mut self.framer, &header, &Body::StrobeAck) {
            Ok(ack) => {
                self.send_frame(&ack);
                self.set_state(State::WaitMasterPacket);
                self.timers
                    .schedule(TimerId::IdleTimeout, self.config.timing.master_packet_wait());
                debug!("sofamac: sent strobe ack to {:?}", master);
            }
            Err(e) => {
                warn!("sofamac: failed to send strobe ack, {:?}", e);
                self.finish(None);
            }
        }
    }

    fn serve_master(&mut self, value: u16, master: Address) {
        self.timers.cancel(TimerId::IdleTimeout);
        self.deliver(value);
        self.set_state(State::WaitMasterPacketAck);

        let header = LinkHeader {
            sender: self.config.address,
            receiver: Address::NULL,
        };
        let body = Body::DataS {
            value: self.pull(),
            dst: master,
        };
        match frame::build(&mut self.framer, &header, &body) {
            Ok(data) => {
                self.send_frame(&data);
                self.timers
                    .schedule(TimerId::IdleTimeout, self.config.timing.master_ack_wait());
            }
            Err(e) => {
                error!("sofamac: data reply failed, {:?}", e);
                self.finish(Some(Outcome::Error));
            }
        }
    }

    fn complete_as_master(&mut self, value: u16, slave: Address) {
        self.timers.cancel(TimerId::IdleTimeout);
        self.deliver(value);

        let header = LinkHeader {
            sender: self.config.address,
            receiver: slave,
        };
        match frame::build(&mut self.framer, &header, &Body::DataAck) {
            Ok(ack) => {
                self.send_frame(&ack);
                debug!("sofamac: data({}) from {:?}", value, slave);
                self.finish(Some(Outcome::Success));
            }
            Err(e) => {
                error!("sofamac: data ack failed, {:?}", e);
                self.finish(Some(Outcome::Error));
            }
        }
    }
}
