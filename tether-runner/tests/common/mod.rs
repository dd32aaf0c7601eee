//! Shared setup for the orchestration tests

use std::sync::Arc;
use std::time::Duration;

use tether_core::domain::Scope;
use tether_runner::Config;
use tether_runner::repository::fake::FakeProvider;

pub fn config() -> Config {
    let mut config = Config::new(Scope::new("octo", "demo"), "build.yml");
    config.poll_interval = Duration::from_secs(5);
    config.wait_timeout = Duration::from_secs(120);
    config.correlation_delay = Duration::from_secs(2);
    config.correlation_attempts = 3;
    config
}

/// Provider whose dispatched runs label themselves with their token
pub fn self_labelling_provider() -> Arc<FakeProvider> {
    Arc::new(FakeProvider::new().with_self_labelling())
}
