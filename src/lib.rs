//! Wireless temperature/humidity node.
//!
//! The library holds everything that does not touch registers: the runtime
//! model, the EEPROM-backed configuration record, the embedded HTTP responder
//! and the main-loop logic. Hardware glue lives behind the `firmware` feature.

#![no_std]

#[cfg(test)]
extern crate std;

#[cfg(feature = "firmware")]
extern crate alloc;

pub mod buffer;
pub mod config;
pub mod connection;
pub mod content;
pub mod eeprom;
pub mod form;
pub mod http;
pub mod json;
pub mod led;
pub mod logic;
pub mod model;
pub mod pages;
pub mod server;
pub mod traits;

#[cfg(feature = "firmware")]
pub mod hardware;
#[cfg(feature = "firmware")]
pub mod net;
#[cfg(feature = "firmware")]
pub mod wifi;
