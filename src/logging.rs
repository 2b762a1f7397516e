use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "ambient-soundscape.log";

/// Default log directory
///
/// - macOS: ~/Library/Application Support/AmbientSoundscape/logs/
/// - Windows: %APPDATA%/AmbientSoundscape/logs/
/// - Linux: ~/.config/AmbientSoundscape/logs/
pub fn default_log_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("AmbientSoundscape").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// `RUST_LOG`-style directives if given and valid, else `default_directive`,
/// else `warn`
fn build_filter(directives: Option<&str>, default_directive: &str) -> EnvFilter {
    directives
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .or_else(|| EnvFilter::try_new(default_directive).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

/// Route engine logs to a daily-rotated file (plus stdout in debug builds)
///
/// `default_directive` applies when `RUST_LOG` is unset or unparseable, e.g.
/// `"info"` or `"ambient_soundscape=debug"`. File writes happen on a
/// background worker; keep the returned guard alive until exit so buffered
/// lines get flushed.
pub fn init_tracing(log_dir: Option<PathBuf>, default_directive: &str) -> WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*};

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: could not create log directory {}: {}", log_dir.display(), e);
    }

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX));

    let env = std::env::var("RUST_LOG").ok();
    let filter = build_filter(env.as_deref(), default_directive);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);
    let console_layer = cfg!(debug_assertions).then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();
    match installed {
        Ok(()) => tracing::info!("Logging to {}", log_dir.display()),
        Err(e) => eprintln!("Warning: tracing subscriber already installed: {}", e),
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir() {
        let dir = default_log_dir();
        assert!(dir.ends_with("logs"));
    }

    #[test]
    fn test_filter_prefers_explicit_directives() {
        let filter = build_filter(Some("ambient_soundscape=debug"), "info");
        assert_eq!(filter.to_string(), "ambient_soundscape=debug");
    }

    #[test]
    fn test_filter_falls_back_to_default_directive() {
        assert_eq!(build_filter(None, "info").to_string(), "info");
        assert_eq!(build_filter(Some("ambient_soundscape=loud"), "error").to_string(), "error");
    }
}
