//! libpep — client library for the PEP authorization daemon.
//!
//! Owns configuration and transport: load a [`PepConfig`], build a
//! [`PepClient`], call [`PepClient::authorize`] with a `pep_core` Request.

pub mod client;
pub mod config;

pub use client::{ClientError, PepClient};
pub use config::{ConfigError, PepConfig};
