//! Mirror Core Library
//!
//! Core functionality for Mirror - consent-gated profile discovery.
//! This crate provides the request-coalescing cache, the mirror/contact
//! access state machine, and the discovery feed aggregator. Transport lives
//! in the host application behind the traits in [`backend`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod access;
mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod discovery;

pub use api::MirrorCore;
pub use config::{ConfigError, CoreConfig};
