use std::time::Duration;

/// Pauses that let residual remote load subside between measurements.
/// They reduce CPU noise; nothing depends on them for correctness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettleDelays {
    /// Between consecutive steps of one configuration.
    pub between_steps: Duration,
    /// Before every configuration except the first.
    pub between_configurations: Duration,
    /// After a successful service start.
    pub after_service_start: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            between_steps: Duration::from_secs(2),
            between_configurations: Duration::from_secs(5),
            after_service_start: Duration::from_secs(5),
        }
    }
}

impl SettleDelays {
    pub fn none() -> Self {
        Self {
            between_steps: Duration::ZERO,
            between_configurations: Duration::ZERO,
            after_service_start: Duration::ZERO,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Time between two CPU samples on the remote host.
    pub interval: Duration,
    /// Slack around the command's start/end when matching samples to it.
    pub window_tolerance: Duration,
    /// Directory on the remote host holding the sample buffer.
    pub remote_dir: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            window_tolerance: Duration::from_secs(2),
            remote_dir: "/tmp".to_string(),
        }
    }
}

pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
