//! Scrape engine module
//!
//! Backward pagination, merging, and the per-pass orchestration loop.

pub mod cancel;
pub mod error;
pub mod merger;
pub mod orchestrator;
pub mod universe;
pub mod walker;

pub use cancel::*;
pub use error::*;
pub use merger::*;
pub use orchestrator::*;
pub use universe::*;
pub use walker::*;
