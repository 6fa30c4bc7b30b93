//! # Olympus Core
//!
//! I/O-free logic for the Olympus query client: data models, the SSE frame
//! decoder, stream event parsing, transcript folding, and stream URL
//! construction.
//!
//! This crate contains no tokio, reqwest, or filesystem access. The
//! `olympus` crate wires these pieces to a network transport.

pub mod endpoint;
pub mod events;
pub mod models;
pub mod sse;
pub mod transcript;
