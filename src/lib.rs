//! # sofamac
//!
//! A portable, no_std Rust implementation of the SOFA (Stop On First Ack)
//! low-power MAC with its push-pull gossip exchange.
//!
//! Every node duty-cycles its radio. To gossip, a node strobes until the first
//! awake neighbor acknowledges, then the two swap one 16-bit value each:
//!
//! - `Strobe` / `StrobeAck` find a partner
//! - `DataM` carries the initiator's value, `DataS` the responder's
//! - `DataAck` closes the exchange on both sides
//!
//! The crate provides:
//! - [`driver::SofaMac`], the event-driven protocol engine
//! - traits for the radio, link framing, alarms and the application ([`hal`], [`frame`], [`timer`])
//! - optional host integrations using either alarm interrupts or a blocking delay loop
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` support |
//! | `delay-loop`          | Polls the MAC with `embedded_hal::delay::DelayNs` between checks |
//! | `timer-isr` (default) | Shares the MAC with interrupt handlers through `critical_section` |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Usage
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
//! loop {
//!     while mac.poll() {}
//! }
//! ```
//!
//! Or, with the `delay-loop` feature:
//!
//! ```rust,ignore
//! sofamac::timer::run_sofa_loop(&mut mac, &mut delay, 100);
//! ```
//!
//! ## Integration Notes
//!
//! - The strobe burst blocks for up to one channel check interval
//!   (one second at the default rate); the [`hal::Watchdog`] is paused meanwhile
//! - Every event handler must run to completion before the next one starts
//! - Only one MAC instance should be active at a time in interrupt-driven mode
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod fmt;

#[cfg(feature = "timer-isr")]
pub use critical_section;

pub use heapless;

pub mod config;
pub mod consts;
pub mod driver;
pub mod error;
pub mod frame;
pub mod fsm;
pub mod hal;
pub mod powercycle;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;
