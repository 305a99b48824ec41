//! Configuration module

pub mod scrape;

pub use scrape::*;
