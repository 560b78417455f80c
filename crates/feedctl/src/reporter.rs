use std::sync::Arc;

/// Sink for user-facing progress and diagnostics.
///
/// The library never prints; the CLI decides where these lines go.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Called with the HTTP method and URI of every outbound request, before it
/// is sent.
pub type RequestObserver = Arc<dyn Fn(&str, &str) + Send + Sync>;
