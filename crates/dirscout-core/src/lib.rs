//! # dirscout core library
//!
//! Locates named directories and files in large, slow, synced directory trees
//! and remembers where it found them.
//!
//! ## Architecture
//!
//! - **Backend** (`backend`): the `FileSystem` trait every walk reads through
//! - **Walk** (`walk`): cooperative depth- and time-bounded tree walker
//! - **Cache** (`cache`): persistent directory cache and exact-path cache
//! - **Search** (`search`): bounded tree search for named targets
//! - **Fuzzy index** (`fuzzy_index`, `identifier`): identifier to file index
//!   with staleness detection and background rebuild
//! - **Locator** (`locator`, `roots`): configured targets, root discovery and
//!   manual overrides
//! - **Persist** (`persist`): atomic JSON writes and corruption quarantine
//! - **Config** (`config`): configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use dirscout_core::{Config, Locator};
//!
//! let locator = Locator::new(Config::load()?)?;
//! let resolution = locator.ensure_initialized()?;
//! if let Some(path) = resolution.get("LAB_REGISTRY_FILE") {
//!     println!("{}", path.display());
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod fuzzy_index;
pub mod identifier;
pub mod locator;
pub mod persist;
pub mod roots;
pub mod search;
pub mod types;
pub mod walk;

// Re-export commonly used types
pub use backend::{FileSystem, LocalFileSystem};
pub use cache::DirectoryCache;
pub use config::Config;
pub use error::{Result, ScoutError};
pub use fuzzy_index::{BuildOutcome, FuzzyFileIndex, IndexStatus, RebuildHandle};
pub use locator::{Locator, LocatorState};
pub use search::TreeSearch;
pub use types::{
    CacheInfo, DirectoryKind, IndexEntry, IndexMetadata, MatchOrigin, Resolution, SearchTarget,
    TargetSet,
};
