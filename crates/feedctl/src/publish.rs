//! `feedctl push`: upload a local package archive to a remote feed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::feed::{FeedConnector, TransportError};
use crate::package::{PackageArchive, PackageError};
use crate::reporter::{Reporter, RequestObserver};

/// Used when the configured timeout is zero or absent.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Client label sent with every request.
pub const USER_AGENT: &str = concat!("feedctl/", env!("CARGO_PKG_VERSION"));

/// Substring of a transport message identifying an HTTP 500 response.
pub const INTERNAL_SERVER_ERROR: &str = "(500) Internal Server Error";

/// Everything one push needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Configured source string; may name several feeds.
    pub target_feeds: String,
    pub api_key: String,
    /// As configured. Signed, possibly zero or absent.
    pub timeout_seconds: Option<i64>,
    pub package_path: PathBuf,
    pub verbose: bool,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(
        "There was an internal server error, which might mean the package already exists on a Simple OData Server."
    )]
    RemoteServer {
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Upload timeout for a configured value: its magnitude in seconds, or
/// [`DEFAULT_TIMEOUT`] when that magnitude is zero.
pub fn effective_timeout(timeout_seconds: Option<i64>) -> Duration {
    match timeout_seconds.unwrap_or(0).unsigned_abs() {
        0 => DEFAULT_TIMEOUT,
        secs => Duration::from_secs(secs),
    }
}

/// Map a failed push to the error the user sees. Only the HTTP 500 case is
/// rewritten; the transport error stays reachable as the source.
pub fn classify_push_failure(err: TransportError) -> PublishError {
    if err.message().contains(INTERNAL_SERVER_ERROR) {
        PublishError::RemoteServer { source: err }
    } else {
        PublishError::Transport(err)
    }
}

/// Pushes packages through a [`FeedConnector`].
pub struct PackagePublisher<C> {
    connector: C,
    observer: RequestObserver,
}

impl<C: FeedConnector> PackagePublisher<C> {
    /// `observer` is attached to the feed client only for verbose requests.
    pub fn new(connector: C, observer: RequestObserver) -> Self {
        Self {
            connector,
            observer,
        }
    }

    pub fn publish(
        &self,
        request: &PublishRequest,
        reporter: &mut dyn Reporter,
    ) -> Result<(), PublishError> {
        let timeout = effective_timeout(request.timeout_seconds);

        let observer = request.verbose.then(|| Arc::clone(&self.observer));
        let client = self
            .connector
            .connect(&request.target_feeds, USER_AGENT, observer)?;

        let archive = PackageArchive::open(&request.package_path)?;
        let full_name = match archive.identity() {
            Ok(identity) => identity.full_name(),
            Err(err) => {
                let fallback = archive.file_stem();
                reporter.warn(&format!("{err}; reporting the package as {fallback}"));
                fallback
            }
        };

        let timeout_millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let package = archive.open_read()?;
        client
            .push(&request.api_key, package, archive.len(), timeout_millis, true)
            .map_err(classify_push_failure)?;

        reporter.info(&format!(
            "{full_name} was pushed successfully to {}",
            request.target_feeds
        ));

        Ok(())
    }
}
