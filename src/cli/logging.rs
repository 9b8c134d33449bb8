//! Logger bootstrap for the CLI
//!
//! Engine events go through the `log` facade; this installs a
//! `flexi_logger` backend writing to stderr so stdout stays clean for
//! command output.

use anyhow::{anyhow, Result};
use flexi_logger::{Logger, LoggerHandle};

/// Level used when neither `--verbose` nor `log_level` is set
pub const DEFAULT_LEVEL: &str = "warn";

/// Picks the log spec: `--verbose` wins, then the configured level
pub fn effective_level(verbose: bool, configured: Option<&str>) -> &str {
    if verbose {
        return "debug";
    }
    configured
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_LEVEL)
}

/// Lowercases bare level names; module specs like `echelon=debug` pass
/// through for flexi_logger to validate.
pub fn normalize_level(level: &str) -> String {
    let trimmed = level.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        lower @ ("off" | "error" | "warn" | "info" | "debug" | "trace") => lower.to_string(),
        "warning" => "warn".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Starts stderr logging. Keep the handle alive until the process exits.
pub fn init_logging(level: &str) -> Result<LoggerHandle> {
    let spec = normalize_level(level);
    Logger::try_with_str(&spec)
        .map_err(|err| anyhow!("invalid log level `{}`: {}", spec, err))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .map_err(|err| anyhow!("failed to start logger: {}", err))
}
