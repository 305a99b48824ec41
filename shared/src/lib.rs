pub mod catalog;
pub mod config;

pub use catalog::CatalogClient;
pub use config::Config;
