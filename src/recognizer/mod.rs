//! Continuous recognizer adapter
//!
//! Wraps a host streaming speech recognizer and keeps it running
//! indefinitely in continuous mode: the underlying engines self-terminate
//! after any pause, so the adapter restarts them, bounds consecutive
//! restart failures, exempts benign error kinds, and watches for silent
//! wedges.

mod adapter;

pub use adapter::{AdapterState, RecognizerAdapter, RecognizerAdapterConfig};
