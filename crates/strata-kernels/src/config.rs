//! Kernel execution settings.
//!
//! Kernels may split their independent output rows across the rayon pool.
//! Whether they do, and from how many rows on, is process-wide state read
//! at every kernel call.

use std::sync::OnceLock;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Environment variable enabling or disabling row parallelism (`0`/`1`,
/// `false`/`true`).
pub const ENV_PARALLEL: &str = "STRATA_PARALLEL";
/// Environment variable overriding [`KernelConfig::min_parallel_rows`].
pub const ENV_MIN_PARALLEL_ROWS: &str = "STRATA_MIN_PARALLEL_ROWS";

/// How kernels schedule their per-row work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Split rows across the rayon pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Below this many rows a kernel runs on the calling thread.
    #[serde(default = "default_min_parallel_rows")]
    pub min_parallel_rows: usize,
}

fn default_true() -> bool {
    true
}

fn default_min_parallel_rows() -> usize {
    64
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel_rows: default_min_parallel_rows(),
        }
    }
}

impl KernelConfig {
    /// Everything on the calling thread.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Defaults overridden by `STRATA_PARALLEL` / `STRATA_MIN_PARALLEL_ROWS`.
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_PARALLEL) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => config.parallel = true,
                "0" | "false" | "off" => config.parallel = false,
                other => tracing::warn!(value = other, "ignoring {ENV_PARALLEL}"),
            }
        }
        if let Some(raw) = lookup(ENV_MIN_PARALLEL_ROWS) {
            match raw.trim().parse::<usize>() {
                Ok(rows) => config.min_parallel_rows = rows,
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring {ENV_MIN_PARALLEL_ROWS}"),
            }
        }
        config
    }

    /// Whether `rows` independent rows should go to the rayon pool.
    pub fn use_parallel(&self, rows: usize) -> bool {
        self.parallel && rows >= self.min_parallel_rows.max(2)
    }
}

static CONFIG: OnceLock<RwLock<KernelConfig>> = OnceLock::new();

fn global() -> &'static RwLock<KernelConfig> {
    CONFIG.get_or_init(|| RwLock::new(KernelConfig::from_env()))
}

/// Current process-wide kernel settings.
pub fn config() -> KernelConfig {
    *global().read()
}

/// Replace the process-wide kernel settings.
pub fn set_config(config: KernelConfig) {
    tracing::debug!(?config, "kernel config updated");
    *global().write() = config;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = KernelConfig::default();
        assert!(c.parallel);
        assert_eq!(c.min_parallel_rows, 64);
        assert!(!c.use_parallel(10));
        assert!(c.use_parallel(64));
        assert!(!KernelConfig::sequential().use_parallel(10_000));
    }

    #[test]
    fn test_single_row_never_parallel() {
        let c = KernelConfig {
            parallel: true,
            min_parallel_rows: 0,
        };
        assert!(!c.use_parallel(1));
        assert!(c.use_parallel(2));
    }

    #[test]
    fn test_from_lookup() {
        let c = KernelConfig::from_lookup(|key| match key {
            ENV_PARALLEL => Some("off".into()),
            ENV_MIN_PARALLEL_ROWS => Some(" 8 ".into()),
            _ => None,
        });
        assert!(!c.parallel);
        assert_eq!(c.min_parallel_rows, 8);

        let c = KernelConfig::from_lookup(|key| match key {
            ENV_MIN_PARALLEL_ROWS => Some("many".into()),
            _ => None,
        });
        assert_eq!(c, KernelConfig::default());
    }

    #[test]
    fn test_serde_fills_defaults() {
        let c: KernelConfig = serde_json::from_str(r#"{"parallel": false}"#).unwrap();
        assert_eq!(c, KernelConfig { parallel: false, min_parallel_rows: 64 });
        let json = serde_json::to_string(&KernelConfig::default()).unwrap();
        assert_eq!(json, r#"{"parallel":true,"min_parallel_rows":64}"#);
    }
}
