//! Headless game client library.
//!
//! [`network`] owns the TCP connection: a writer task drains a bounded
//! send queue, a reader task decodes the inbound byte stream and
//! forwards every packet through an event channel. Consumers drive
//! their own loop off that channel instead of registering callbacks,
//! which keeps packet handling in one place and plays well with
//! `tokio::select!`.

pub mod network;
