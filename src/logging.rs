//! Where log output goes. The terminal UI owns the TTY, so in that mode the
//! subscriber writes to a file instead of stderr.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::display::DisplayMode;

#[derive(Debug, Clone, PartialEq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Log file used while the terminal UI is up (~/.local/share/scopelight/scopelight.log)
pub fn log_file_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("scopelight").join("scopelight.log"))
}

pub fn target_for(mode: DisplayMode) -> LogTarget {
    match (mode, log_file_path()) {
        (DisplayMode::Terminal, Some(path)) => LogTarget::File(path),
        // Without a data dir, terminal mode falls back to warnings on stderr
        (DisplayMode::Terminal, None) | (DisplayMode::Headless, _) => LogTarget::Stderr,
    }
}

fn filter(default_directive: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
}

/// Install the global subscriber for `mode`. Call once, before anything logs.
pub fn init(mode: DisplayMode) -> Result<()> {
    match target_for(mode) {
        LogTarget::Stderr => {
            let directive = match mode {
                DisplayMode::Terminal => "scopelight=warn",
                DisplayMode::Headless => "scopelight=info",
            };
            tracing_subscriber::fmt()
                .with_env_filter(filter(directive)?)
                .with_writer(std::io::stderr)
                .init();
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter("scopelight=info")?)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_logs_to_stderr() {
        assert_eq!(target_for(DisplayMode::Headless), LogTarget::Stderr);
    }

    #[test]
    fn terminal_mode_keeps_logs_off_the_screen() {
        match target_for(DisplayMode::Terminal) {
            LogTarget::File(path) => {
                assert!(path.ends_with("scopelight/scopelight.log"));
                assert_eq!(Some(path), log_file_path());
            }
            LogTarget::Stderr => assert!(log_file_path().is_none()),
        }
    }
}
