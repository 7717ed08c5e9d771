use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Deadline for a single attempt against the dependency.
    pub timeout: Duration,
    /// Failures (within the decay window) that trip a closed circuit.
    pub max_failures: u32,
    pub open_to_half_open_wait: Duration,
    pub half_open_max_success: u32,
    pub half_open_max_failures: u32,
    /// One attempt per entry; each entry is the pause after that attempt fails.
    pub retry_intervals: Vec<Duration>,
}

impl BreakerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("BREAKER_TIMEOUT_MS")
            && let Ok(parsed) = value.trim().parse::<u64>()
        {
            config.timeout = Duration::from_millis(parsed.max(1));
        }
        if let Some(value) = lookup("BREAKER_MAX_FAILURES")
            && let Ok(parsed) = value.trim().parse::<u32>()
        {
            config.max_failures = parsed.max(1);
        }
        if let Some(value) = lookup("BREAKER_OPEN_WAIT_MS")
            && let Ok(parsed) = value.trim().parse::<u64>()
        {
            config.open_to_half_open_wait = Duration::from_millis(parsed);
        }
        if let Some(value) = lookup("BREAKER_HALF_OPEN_MAX_SUCCESS")
            && let Ok(parsed) = value.trim().parse::<u32>()
        {
            config.half_open_max_success = parsed.max(1);
        }
        if let Some(value) = lookup("BREAKER_HALF_OPEN_MAX_FAILURES")
            && let Ok(parsed) = value.trim().parse::<u32>()
        {
            config.half_open_max_failures = parsed.max(1);
        }
        if let Some(value) = lookup("BREAKER_RETRY_INTERVALS_MS")
            && let Some(parsed) = parse_intervals(&value)
        {
            config.retry_intervals = parsed;
        }

        config
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_failures: 5,
            open_to_half_open_wait: Duration::from_secs(30),
            half_open_max_success: 5,
            half_open_max_failures: 3,
            retry_intervals: [1, 2, 3, 5, 8].into_iter().map(Duration::from_secs).collect(),
        }
    }
}

fn parse_intervals(value: &str) -> Option<Vec<Duration>> {
    let intervals = value
        .split(',')
        .map(|part| part.trim().parse::<u64>().ok().map(Duration::from_millis))
        .collect::<Option<Vec<_>>>()?;
    (!intervals.is_empty()).then_some(intervals)
}
