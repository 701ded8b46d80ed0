//! Resilience settings for upstream calls
//!
//! Timeout defaults and retry classification. Retry backoff itself comes
//! from the `backon` crate.

pub mod timeout {
    //! Timeout configuration for upstream calls

    use std::time::Duration;

    /// Default timeout for one source list or targeted lookup
    pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

    /// Default timeout for the provider availability lookup
    pub const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);
}

pub mod retry {
    //! Retry classification and backoff policy

    use std::time::Duration;

    use backon::ExponentialBuilder;
    use streamfall_providers::ProviderClientError;

    /// Backoff for idempotent lookups (100ms base, 1s max, with jitter)
    #[must_use]
    pub fn lookup_backoff(max_times: usize) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(1))
            .with_max_times(max_times)
            .with_jitter()
    }

    /// Whether an upstream client error is worth retrying
    #[must_use]
    pub fn should_retry(err: &ProviderClientError) -> bool {
        match err {
            ProviderClientError::Network(_) | ProviderClientError::Timeout(_) => true,
            ProviderClientError::Http { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}
