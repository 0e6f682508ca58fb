//! Core domain + application logic for the Quill note service.
//!
//! This crate is intentionally framework-agnostic. Telegram and the web layer
//! live behind ports (traits) implemented in adapter crates.

pub mod access;
pub mod adapter;
pub mod config;
pub mod context;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod format;
pub mod handlers;
pub mod keyring;
pub mod logging;
pub mod ports;
pub mod render;
pub mod reply;
pub mod store;
pub mod token;
pub mod update;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::{Error, Result};
