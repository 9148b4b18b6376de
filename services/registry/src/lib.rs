//! # Docker Registry Panel
//!
//! A read/delete client for a [Docker Registry HTTP API V2] server, the
//! statistics built on top of it, and a small JSON API for a management panel.
//!
//! ## Features
//!
//! - Repository, tag and manifest lookups, with catalog pagination
//! - Tag deletion by manifest digest, and cascading repository deletion
//! - Bounded, ordered fan-out over tags and repositories
//! - Cancellation of whole operations through a [`CancellationToken`]
//! - An axum [`router`](api::router) serving the panel endpoints under `/v1/api`
//!
//! Every operation returns an [`Outcome`], which tells apart a missing entity, an
//! upstream failure, and a cancelled call. The boundary accessors
//! ([`Outcome::into_items`], [`Outcome::into_option`], [`Outcome::is_found`])
//! collapse those into empty, absent or false values for callers that do not care why.
//!
//! ## Example
//!
//! ```no_run
//! use registry::{RegistryClient, RegistryConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let client = RegistryClient::new(&RegistryConfig::default());
//! let cancel = CancellationToken::new();
//!
//! for repository in client.list_repositories(&cancel).await.into_items() {
//!     println!("{} ({} tags)", repository.name, repository.tag_count);
//! }
//! # }
//! ```
//!
//! [Docker Registry HTTP API V2]: https://distribution.github.io/distribution/spec/api/
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod api;
mod client;
mod config;
mod delete;
mod error;
mod manifest;
mod models;
mod outcome;
mod stats;

pub use client::RegistryClient;
pub use config::{PanelConfig, RegistryConfig, ServerConfig, SizeStrategy};
pub use delete::{DeleteReport, DeletionStatus, TagDeletion};
pub use error::RegistryError;
pub use manifest::{MANIFEST_V2, approximate_size_from_digest};
pub use models::{ManifestInfo, RepositoryDetailInfo, RepositoryInfo, TagInfo};
pub use outcome::Outcome;
pub use stats::{RegistrySummary, RepositoryStats};
