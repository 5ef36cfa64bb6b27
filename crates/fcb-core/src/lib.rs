//! Core domain + application logic for the file conversion bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the Convertio
//! API live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod convert;
pub mod domain;
pub mod errors;
pub mod formats;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod session;

pub use errors::{Error, Result};
