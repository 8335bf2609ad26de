use super::Runtime;
use super::core::Config;

use std::time::Duration;

/// Builder for configuring and creating a runtime.
///
/// `RuntimeBuilder` allows customizing the event loop before it is
/// created: how many ready frames are resumed per turn before timers are
/// serviced, and how long the loop may park when idle.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .event_budget(32)
///     .max_park(Duration::from_millis(50))
///     .build();
/// ```
pub struct RuntimeBuilder {
    config: Config,
}

impl RuntimeBuilder {
    /// Creates a new `RuntimeBuilder` with default configuration.
    ///
    /// By default a turn resumes up to 64 ready frames and an idle loop
    /// parks for at most 100 milliseconds at a time.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Sets how many ready frames the loop resumes before it services
    /// expired timers.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let builder = RuntimeBuilder::new()
    ///     .event_budget(8);
    /// ```
    pub fn event_budget(mut self, n: usize) -> Self {
        assert!(n > 0, "event_budget must be > 0");

        self.config.event_budget = n;
        self
    }

    /// Sets the longest time an idle loop parks before checking its
    /// queues again.
    ///
    /// # Panics
    ///
    /// Panics if `duration` is zero.
    pub fn max_park(mut self, duration: Duration) -> Self {
        assert!(!duration.is_zero(), "max_park must be non-zero");

        self.config.max_park = duration;
        self
    }

    /// Builds the runtime with the configured options.
    ///
    /// The loop belongs to the calling thread.
    pub fn build(self) -> Runtime {
        Runtime::new(self.config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
