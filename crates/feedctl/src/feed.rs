//! Feed client: the remote end of `feedctl push`.
//!
//! [`FeedConnector`] builds a [`FeedClient`] bound to a set of target feeds;
//! the HTTP implementation speaks the package push endpoint
//! (`PUT <feed>/api/v2/package/`, multipart body, `X-NuGet-ApiKey` header).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use thiserror::Error;

use crate::reporter::RequestObserver;

pub const API_KEY_HEADER: &str = "X-NuGet-ApiKey";
pub const PUSH_ENDPOINT: &str = "api/v2/package/";

const MAX_BODY_IN_MESSAGE: usize = 200;

/// A failed exchange with a remote feed.
///
/// HTTP status failures carry a message of the form
/// `The remote server returned an error: (<code>) <reason>.`
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Pushes package archives to the feeds it was connected to.
pub trait FeedClient {
    /// Upload `package` (of `content_length` bytes). The handle is consumed so
    /// it is closed however the push ends.
    fn push(
        &self,
        api_key: &str,
        package: File,
        content_length: u64,
        timeout_millis: u64,
        disable_buffering: bool,
    ) -> Result<(), TransportError>;
}

/// Builds feed clients.
pub trait FeedConnector {
    /// `feeds` is the configured source string, possibly several targets
    /// separated by `,` or `;`. `observer`, when given, sees every request
    /// before it is sent.
    fn connect(
        &self,
        feeds: &str,
        user_agent: &str,
        observer: Option<RequestObserver>,
    ) -> Result<Box<dyn FeedClient>, TransportError>;
}

/// Split a source string into its individual targets.
pub fn split_feeds(feeds: &str) -> Vec<&str> {
    feeds
        .split([',', ';'])
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .collect()
}

/// [`FeedConnector`] producing [`HttpFeedClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl FeedConnector for HttpConnector {
    fn connect(
        &self,
        feeds: &str,
        user_agent: &str,
        observer: Option<RequestObserver>,
    ) -> Result<Box<dyn FeedClient>, TransportError> {
        Ok(Box::new(HttpFeedClient::new(feeds, user_agent, observer)?))
    }
}

/// Blocking HTTP feed client.
pub struct HttpFeedClient {
    targets: Vec<String>,
    http: Client,
    observer: Option<RequestObserver>,
}

impl HttpFeedClient {
    pub fn new(
        feeds: &str,
        user_agent: &str,
        observer: Option<RequestObserver>,
    ) -> Result<Self, TransportError> {
        let targets = split_feeds(feeds);
        if targets.is_empty() {
            return Err(TransportError::new("no target feed given"));
        }

        for target in &targets {
            if !(target.starts_with("http://") || target.starts_with("https://")) {
                return Err(TransportError::new(format!(
                    "unsupported feed location '{target}'; packages can only be pushed to http(s) feeds"
                )));
            }
        }

        // Timeouts are applied per request.
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| TransportError::with_source("failed to build HTTP client", e))?;

        Ok(Self {
            targets: targets.into_iter().map(str::to_string).collect(),
            http,
            observer,
        })
    }

    fn push_url(target: &str) -> String {
        format!("{}/{PUSH_ENDPOINT}", target.trim_end_matches('/'))
    }

    fn push_one(
        &self,
        target: &str,
        api_key: &str,
        mut package: File,
        content_length: u64,
        timeout: Duration,
        disable_buffering: bool,
    ) -> Result<(), TransportError> {
        let url = Self::push_url(target);

        let part = if disable_buffering {
            Part::reader_with_length(package, content_length)
        } else {
            let mut buffer = Vec::with_capacity(usize::try_from(content_length).unwrap_or(0));
            package
                .read_to_end(&mut buffer)
                .map_err(|e| TransportError::with_source("failed to read package", e))?;
            Part::bytes(buffer)
        };
        let part = part
            .file_name("package.nupkg")
            .mime_str("application/octet-stream")
            .map_err(|e| TransportError::with_source("invalid package content type", e))?;

        let request = self
            .http
            .put(&url)
            .header(API_KEY_HEADER, api_key)
            .timeout(timeout)
            .multipart(Form::new().part("package", part))
            .build()
            .map_err(|e| TransportError::with_source(format!("failed to build request for {url}"), e))?;

        if let Some(observer) = &self.observer {
            observer(request.method().as_str(), request.url().as_str());
        }

        let response = self.http.execute(request).map_err(|e| {
            if e.is_timeout() {
                TransportError::with_source(
                    format!("push to {url} timed out after {}s", timeout.as_secs()),
                    e,
                )
            } else {
                TransportError::with_source(format!("failed to push to {url}: {e}"), e)
            }
        })?;

        check_status(response)
    }
}

fn check_status(response: Response) -> Result<(), TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    // The body only decorates the message; a failed read leaves it out.
    let body = response.text().unwrap_or_default();
    let body = body.trim();
    let mut message = format!(
        "The remote server returned an error: ({}) {}.",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );
    if !body.is_empty() {
        let snippet: String = body.chars().take(MAX_BODY_IN_MESSAGE).collect();
        message.push(' ');
        message.push_str(&snippet);
    }

    Err(TransportError::new(message))
}

impl FeedClient for HttpFeedClient {
    fn push(
        &self,
        api_key: &str,
        package: File,
        content_length: u64,
        timeout_millis: u64,
        disable_buffering: bool,
    ) -> Result<(), TransportError> {
        let timeout = Duration::from_millis(timeout_millis);

        // Targets are pushed one after another; each gets its own handle
        // rewound to the start of the shared file.
        for target in &self.targets {
            let mut handle = package
                .try_clone()
                .map_err(|e| TransportError::with_source("failed to reopen package", e))?;
            handle
                .seek(SeekFrom::Start(0))
                .map_err(|e| TransportError::with_source("failed to rewind package", e))?;
            self.push_one(target, api_key, handle, content_length, timeout, disable_buffering)?;
        }

        Ok(())
    }
}
