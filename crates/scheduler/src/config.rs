use std::time::Duration;

/// Configuration for the [`crate::BackgroundProcessor`] (spec §5 "scheduling
/// model": one worker owns the periodic scheduler and enqueues strategy
/// ticks, the expiry sweep, and HR sync).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often to poll for due strategies (default: 30 seconds).
    pub strategy_poll_interval: Duration,
    /// How often to run the expiry sweep (default: 5 minutes).
    pub expiry_sweep_interval: Duration,
    /// How often to pull the HR employee/department mapping (default: 15
    /// minutes).
    pub hr_sync_interval: Duration,
    /// Whether strategy dispatch is enabled.
    pub enable_strategy_dispatch: bool,
    /// Whether the expiry sweep is enabled.
    pub enable_expiry_sweep: bool,
    /// Whether HR sync is enabled.
    pub enable_hr_sync: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy_poll_interval: Duration::from_secs(30),
            expiry_sweep_interval: Duration::from_secs(300),
            hr_sync_interval: Duration::from_secs(900),
            enable_strategy_dispatch: true,
            enable_expiry_sweep: true,
            enable_hr_sync: true,
        }
    }
}
