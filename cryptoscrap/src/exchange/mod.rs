//! Exchange integration module
//!
//! HTTP access to the CryptoCompare histo API and the reachability gate.

pub mod client;
pub mod connectivity;

pub use client::*;
pub use connectivity::*;
