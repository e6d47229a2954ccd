//! Synch core library: settings, repository descriptors, content fingerprints.
//!
//! - [`types`]: repository source/destination descriptors
//! - [`settings`]: load / validate the settings document
//! - [`fingerprint`]: the store-compatible content fingerprint over bytes
//! - [`normalize`]: the pluggable relative-path normalization hook
//! - [`error`]: [`ConfigError`]

pub mod error;
pub mod fingerprint;
pub mod normalize;
pub mod settings;
pub mod types;

pub use error::ConfigError;
pub use fingerprint::{
    fingerprint_bytes, fingerprint_reader, Fingerprint, DEFAULT_CHUNK_SIZE, EMPTY_FINGERPRINT,
    MAX_PARTS, MIN_CHUNK_SIZE,
};
pub use normalize::{Identity, PathNormalizer, PathRewrite, Rewrites};
pub use settings::Settings;
pub use types::{DestinationSpec, RepositoryName, RepositorySpec, SourceSpec};
