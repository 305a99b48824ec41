//! Build information embedded by build.rs

use chrono::{TimeZone, Utc};

pub fn git_hash() -> &'static str {
    option_env!("GIT_HASH").unwrap_or("unknown")
}

pub fn git_branch() -> &'static str {
    option_env!("GIT_BRANCH").unwrap_or("unknown")
}

pub fn git_tag() -> &'static str {
    option_env!("GIT_TAG").unwrap_or("unknown")
}

/// Build time as a human-readable UTC string if possible
pub fn build_time() -> String {
    let raw = option_env!("BUILD_TIME").unwrap_or("unknown");
    format_build_time(raw)
}

fn format_build_time(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn summary() -> String {
    format!(
        "version {} (branch {}, tag {}, commit {}, built {})",
        env!("CARGO_PKG_VERSION"),
        git_branch(),
        git_tag(),
        git_hash(),
        build_time()
    )
}
