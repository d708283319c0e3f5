// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Options passed along with writes.

/// Time-to-live applied when no explicit TTL is configured.
pub const DEFAULT_TTL_SECS: f64 = 60.0;

/// Per-write caching options.
///
/// Storages that have no notion of expiry ignore these options. The expiration
/// wrapper in `memoria` interprets them.
///
/// `is_cached_forever` overrides both the TTL and the laziness flag.
///
/// # Examples
///
/// ```
/// use memoria_storage::CacheOptions;
///
/// let defaults = CacheOptions::default();
/// assert_eq!(defaults.ttl_millis(), 60_000);
/// assert!(defaults.is_lazy());
/// assert!(!defaults.is_cached_forever());
///
/// let eager = CacheOptions::new().ttl(5.0).eager();
/// assert_eq!(eager.ttl_millis(), 5_000);
/// assert!(!eager.is_lazy());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheOptions {
    ttl_secs: f64,
    is_lazy: bool,
    is_cached_forever: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            is_lazy: true,
            is_cached_forever: false,
        }
    }
}

impl CacheOptions {
    /// Creates options with the defaults: 60 second TTL, lazy expiry, not forever.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time-to-live in seconds.
    ///
    /// Fractional values are allowed. A zero or negative TTL makes the entry stale
    /// on the very next read.
    #[must_use]
    pub fn ttl(mut self, ttl_secs: f64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Sets whether expiry is only detected on read.
    #[must_use]
    pub fn lazy(mut self, is_lazy: bool) -> Self {
        self.is_lazy = is_lazy;
        self
    }

    /// Schedules a proactive deletion when the TTL elapses, in addition to the read check.
    #[must_use]
    pub fn eager(self) -> Self {
        self.lazy(false)
    }

    /// Marks entries as never expiring.
    #[must_use]
    pub fn forever(mut self) -> Self {
        self.is_cached_forever = true;
        self
    }

    /// Returns the configured time-to-live in seconds.
    #[must_use]
    pub fn ttl_secs(&self) -> f64 {
        self.ttl_secs
    }

    /// Returns the time-to-live in whole milliseconds, rounded to the nearest millisecond.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "ttl values are far below i64::MAX milliseconds")]
    pub fn ttl_millis(&self) -> i64 {
        (self.ttl_secs * 1000.0).round() as i64
    }

    /// Returns whether expiry is detected lazily.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.is_lazy
    }

    /// Returns whether entries never expire.
    #[must_use]
    pub fn is_cached_forever(&self) -> bool {
        self.is_cached_forever
    }
}
