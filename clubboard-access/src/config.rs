// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

const RETRY_INTERVAL: Duration = Duration::ZERO;

/// Configuration parameters for the access cache.
#[derive(Clone, Debug)]
pub struct Config {
    /// Age after which a resolved access entry is resolved again on the next check (`None`
    /// means entries stay valid until they are invalidated).
    ///
    /// Default: `None`.
    pub(crate) max_age: Option<Duration>,

    /// Minimum interval between a failed membership lookup and the next attempt for the same
    /// project.
    ///
    /// Default: 0 seconds, the next check retries.
    pub(crate) retry_interval: Duration,
}

impl Config {
    /// Return a default instance of `Config`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Define the maximum age of a resolved access entry.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Define the minimum interval between retries after a failed lookup.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_age: None,
            retry_interval: RETRY_INTERVAL,
        }
    }
}
