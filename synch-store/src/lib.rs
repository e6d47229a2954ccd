//! # synch-store
//!
//! The remote object-store collaborator: list objects under a prefix with
//! their etags, and write objects.
//!
//! [`S3Store`] talks to an S3 bucket; [`MemoryStore`] keeps objects in
//! process and computes etags the same way the bucket does.

pub mod error;
pub mod memory;
pub mod object;
pub mod s3;

pub use error::StoreError;
pub use memory::{MemoryStore, StoredObject};
pub use object::{Body, ObjectStore, PutRequest, RemoteObject};
pub use s3::S3Store;
