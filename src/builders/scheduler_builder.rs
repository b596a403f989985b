//! Builders to construct schedulers from configuration.

use crate::config::SchedulerConfig;
use crate::core::{Scheduler, SchedulerError, SchedulerObserver, TracingObserver};

/// Step-by-step construction of a [`Scheduler`].
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    observers: Vec<Box<dyn SchedulerObserver>>,
}

impl SchedulerBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    /// Attach an observer. Observers are notified in registration order.
    #[must_use]
    pub fn with_observer(mut self, observer: impl SchedulerObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Validate the configuration, spawn workers and return the scheduler.
    ///
    /// A `TracingObserver` is registered first when `trace_events` is set.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` or `SchedulerError::Spawn`.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        let mut observers: Vec<Box<dyn SchedulerObserver>> = Vec::new();
        if self.config.trace_events {
            observers.push(Box::new(TracingObserver));
        }
        observers.extend(self.observers);
        Scheduler::from_parts(self.config, observers)
    }
}

/// Build a scheduler from configuration with the given observers.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidConfig` or `SchedulerError::Spawn`.
pub fn build_scheduler<I>(cfg: &SchedulerConfig, observers: I) -> Result<Scheduler, SchedulerError>
where
    I: IntoIterator<Item = Box<dyn SchedulerObserver>>,
{
    let mut builder = SchedulerBuilder::new(cfg.clone());
    builder.observers.extend(observers);
    builder.build()
}
