use std::time::Duration;

/// Pipeline tuning, environment-driven with fixed defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum total instruction count for a display cluster to qualify.
    pub drawer_instruction_threshold: usize,
    /// Minimum block count for a canvas cluster to qualify.
    pub pixmap_block_threshold: usize,
    /// Debounce delay between a qualifying change and its classification.
    pub processing_delay: Duration,
    /// Processing worker wake-up period.
    pub worker_period: Duration,
    /// Ban duration issued on a TRIGGER verdict.
    pub punishment_duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drawer_instruction_threshold: 128,
            pixmap_block_threshold: 9,
            processing_delay: Duration::from_secs(5),
            worker_period: Duration::from_secs(1),
            punishment_duration: Duration::from_secs(3 * 24 * 3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            drawer_instruction_threshold: env_parse("DRAWER_INSTRUCTION_THRESHOLD", 128),
            pixmap_block_threshold: env_parse("PIXMAP_BLOCK_THRESHOLD", 9),
            processing_delay: Duration::from_secs(env_parse("IMAGE_PROCESSING_DELAY_SECS", 5)),
            worker_period: Duration::from_millis(env_parse("WORKER_PERIOD_MS", 1000)),
            punishment_duration: Duration::from_secs(env_parse(
                "PUNISHMENT_DURATION_SECS",
                3 * 24 * 3600,
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_constants() {
        let config = Config::default();
        assert_eq!(config.drawer_instruction_threshold, 128);
        assert_eq!(config.pixmap_block_threshold, 9);
        assert_eq!(config.punishment_duration, Duration::from_secs(259_200));
    }
}
