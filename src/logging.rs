//! Structured logging setup.
//!
//! Compact timestamped lines on stderr, so command output on stdout stays
//! machine-readable. Levels come from the `[logging]` config table:
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! docshelf = "info"
//! ```
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=docshelf=debug shelf cluster
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the filter directive string from config.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.default.clone();
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    for (module, level) in modules {
        filter_str.push_str(&format!(",{module}={level}"));
    }
    filter_str
}

/// Initialize logging. Only the first call takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Initialize with the default (`warn`) configuration.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_filter_directives() {
        let config = LoggingConfig {
            default: "warn".into(),
            modules: HashMap::from([
                ("docshelf".to_string(), "info".to_string()),
                ("docshelf_core".to_string(), "debug".to_string()),
            ]),
        };
        assert_eq!(
            filter_directives(&config),
            "warn,docshelf=info,docshelf_core=debug"
        );
    }
}
