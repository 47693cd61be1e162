//! Lock manager configuration.

/// Configuration for a [`TransactionManager`](crate::TransactionManager).
#[derive(Debug, Clone)]
pub struct Config {
    /// How many committed serials to read per conflict check.
    ///
    /// Only the newest one decides, so 1 is enough unless a data manager
    /// returns history out of order. Values below 1 are treated as 1.
    pub history_limit: usize,

    /// Whether aborting an untracked ttid is ignored instead of fatal.
    pub ignore_unknown_abort: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: 1,
            ignore_unknown_abort: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many committed serials to read per conflict check.
    #[must_use]
    pub const fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Sets whether aborting an untracked ttid is ignored.
    #[must_use]
    pub const fn ignore_unknown_abort(mut self, value: bool) -> Self {
        self.ignore_unknown_abort = value;
        self
    }

    pub(crate) fn effective_history_limit(&self) -> usize {
        self.history_limit.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.history_limit, 1);
        assert!(!config.ignore_unknown_abort);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new().history_limit(8).ignore_unknown_abort(true);

        assert_eq!(config.history_limit, 8);
        assert!(config.ignore_unknown_abort);
    }

    #[test]
    fn zero_history_limit_is_clamped() {
        let config = Config::new().history_limit(0);
        assert_eq!(config.effective_history_limit(), 1);
    }
}
