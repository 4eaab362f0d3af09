//! paxcount library — portable anonymous device counting engine.
//!
//! Counts distinct nearby wireless devices over rolling report windows for
//! passenger/footfall estimation. A device is identified by the last two
//! bytes of its hardware address; a fixed 65536-bit set deduplicates repeat
//! sightings within a window, so memory use is constant no matter how busy
//! the airspace gets. Two addresses sharing those bytes collide and count
//! as one device, an accepted approximation of the design.
//!
//! This crate is the counting core only, with no platform dependencies,
//! testable on any host with `cargo test`. The radio scan driver, the timer
//! service that fires the periodic report tick, and the transport that
//! carries reports are collaborators supplied by the embedding firmware:
//! - the scan driver feeds addresses into [`controller::Counter::on_device_observed`]
//!   and is controlled through the [`controller::ScanDriver`] trait;
//! - the timer service calls [`controller::Counter::tick`] once per report
//!   period;
//! - reports leave through the [`reporter::CountObserver`] trait, with an
//!   NDJSON rendering in [`protocol`] for serial/companion links.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod idset;
pub mod protocol;
pub mod reporter;
