//! Data management module
//!
//! Candle series types and their on-disk stores.

pub mod candle;
pub mod ignore_list;
pub mod pair;
pub mod storage;

pub use candle::*;
pub use ignore_list::*;
pub use pair::*;
pub use storage::*;
