//! Build identity stamped on responses and heartbeats.

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source revision, from `APP_REVISION` at compile time.
pub const REVISION: &str = match option_env!("APP_REVISION") {
    Some(rev) => rev,
    None => "unknown",
};

/// `<version> (<revision>)`, as printed by `--version`.
pub fn long_version() -> String {
    format!("{VERSION} ({REVISION})")
}
