use thiserror::Error;

/// Transport/venue-facing error kinds. Callers (collector, backfill) decide
/// whether a given variant is worth retrying; the provider itself never
/// retries on its own.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error calling {provider}: {message}")]
    Http { provider: String, message: String },

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("{provider} does not support {capability}")]
    Unsupported { provider: String, capability: String },

    #[error("timeout calling {provider}")]
    Timeout { provider: String },

    #[error("{provider} returned malformed data: {message}")]
    Malformed { provider: String, message: String },
}

pub type ProviderResult<T> = Result<T, ProviderError>;
