use std::future::Future;

use thiserror::Error;

/// Failure talking to an upstream API or RPC node.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("rpc call failed: {0}")]
    Rpc(#[from] web3::Error),
    #[error("abi error: {0}")]
    Abi(#[from] ethabi::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("missing field `{0}` in response")]
    Missing(&'static str),
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Value produced by [`fetch_with_fallback`], tagged with where it came from.
#[derive(Debug)]
pub enum Fetched<T> {
    Live(T),
    Fallback { value: T, error: FetchError },
}

impl<T> Fetched<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Live(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Live(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Console marker for values that did not come from the upstream source.
    pub fn marker(&self) -> &'static str {
        if self.is_fallback() {
            "⚠️ "
        } else {
            ""
        }
    }

    /// The live value, or the error that forced the fallback.
    pub fn into_result(self) -> Result<T, FetchError> {
        match self {
            Self::Live(value) => Ok(value),
            Self::Fallback { error, .. } => Err(error),
        }
    }
}

/// Awaits `fut`, substituting `fallback` (and logging a warning) when it fails.
pub async fn fetch_with_fallback<T, Fut>(label: &str, fut: Fut, fallback: T) -> Fetched<T>
where
    Fut: Future<Output = Result<T, FetchError>>,
{
    match fut.await {
        Ok(value) => Fetched::Live(value),
        Err(error) => {
            log::warn!("⚠️ [fetch] {label}: {error}; using fallback");
            Fetched::Fallback {
                value: fallback,
                error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_live_value_is_kept() {
        let fetched = fetch_with_fallback("ok", async { Ok::<_, FetchError>(42) }, 0).await;
        assert!(!fetched.is_fallback());
        assert_eq!(fetched.marker(), "");
        assert_eq!(fetched.into_result().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_error_substitutes_fallback() {
        let fetched = fetch_with_fallback(
            "broken",
            async { Err::<f64, _>(FetchError::Missing("tvl")) },
            2000.0,
        )
        .await;
        assert!(fetched.is_fallback());
        assert_eq!(*fetched.value(), 2000.0);
        assert!(matches!(
            fetched.into_result(),
            Err(FetchError::Missing("tvl"))
        ));
    }
}
