//! # feedctl
//!
//! Manage package feed sources and push `.nupkg` archives to remote feeds.
//!
//! ## Pipelines
//!
//! - **source**: [`source::SourceRegistryProcessor`] parses the positional
//!   sub-command, validates the request and routes it to one capability of a
//!   [`source::RegistryService`]. [`registry::ConfigRegistry`] is the
//!   file-backed service used by the CLI.
//! - **push**: [`publish::PackagePublisher`] resolves the upload timeout,
//!   connects a [`feed::FeedClient`], reads the package identity and streams
//!   the archive to every configured target.
//!
//! ## Modules
//!
//! - [`source`] — sub-command parsing, validation and dispatch
//! - [`registry`] — config-file backed source registry
//! - [`publish`] — package upload orchestration and error translation
//! - [`feed`] — HTTP feed client (`PUT api/v2/package/`)
//! - [`package`] — local package archives and their manifest
//! - [`auth`] — API key resolution
//! - [`reporter`] — progress sink and request observer

/// `--key` → `FEEDCTL_API_KEY_<FEED>` → `FEEDCTL_API_KEY`.
pub mod auth;

/// HTTP feed client.
pub mod feed;

/// Local package archives.
pub mod package;

/// Package upload orchestration.
pub mod publish;

/// Config-file backed [`source::RegistryService`].
pub mod registry;

pub mod reporter;

/// `feedctl source` processing.
pub mod source;


pub use publish::{PackagePublisher, PublishError, PublishRequest, effective_timeout};
pub use reporter::{Reporter, RequestObserver};
pub use source::{
    RegistryService, SourceCommand, SourceCommandSpec, SourceError, SourceRegistryProcessor,
};
