use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "VM_LAUNCHER_DATA_DIR";

/// Platform-specific locations abstracted behind a common interface.
/// Each OS provides its own `NativePlatform` implementation so call sites
/// remain free of `#[cfg]` blocks.
pub trait Platform {
    /// Root data directory holding `config.toml`.
    /// Unix: `~/.vm-launcher`, Windows: `%APPDATA%\vm-launcher`.
    fn data_dir() -> PathBuf;
}

/// `VM_LAUNCHER_DATA_DIR` wins over the platform default when set and non-empty.
pub(crate) fn resolve_data_dir(default: PathBuf) -> PathBuf {
    resolve_with_override(std::env::var(DATA_DIR_ENV).ok(), default)
}

fn resolve_with_override(value: Option<String>, default: PathBuf) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
