//! Taiga Bridge - client-side adaptation layer for the Taiga REST API
//!
//! Callers address project entities with the identifiers a human uses
//! (project-scoped refs, usernames, status and sprint names) and get back
//! stable views regardless of how the backend version shapes its payloads.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Tool surface / CLI                   │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//!                 ┌──────────▼──────────┐
//!                 │    Domain Facade    │
//!                 └───┬─────────────┬───┘
//!                     │             │
//!      ┌──────────────▼───┐   ┌─────▼──────────────┐
//!      │ Reference        │   │ Entity Normalizer  │
//!      │ Resolver (cache) │   │ (views, sanitize)  │
//!      └──────────┬───────┘   └────────────────────┘
//!                 │
//!         ┌───────▼────────┐
//!         │   Transport    │  HttpTransport | ScriptedTransport
//!         └────────────────┘
//! ```
//!
//! # Features
//!
//! - **Ref addressing**: every get/update/comment takes a project-scoped ref
//! - **Lazy caches**: users and lookup taxonomies are warmed on first need
//! - **Shape tolerance**: raw foreign keys and `*_extra_info` siblings both work
//! - **Optimistic concurrency**: stale writes surface as [`BridgeError::VersionConflict`]

pub mod cache;
pub mod config;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod model;
pub mod normalize;
pub mod resolver;
pub mod transport;

pub use cache::{Cache, MemoryCache};
pub use config::BridgeConfig;
pub use error::{BridgeError, FailedStep, HttpError, Result, ResultExt};
pub use facade::{Facade, ListFilter, SprintFilter};
pub use fallback::FallbackChain;
pub use model::{
    CommentView, EntityKind, EpicLinkView, ItemDetails, LookupEntry, LookupKind, ProjectSelector,
    ProjectView, SprintView, Token, UserSummary, WorkItemView,
};
pub use resolver::{Resolver, SprintSelection};
pub use transport::{HttpTransport, Method, Query, ScriptedTransport, Transport};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.taiga.io/api/v1";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
