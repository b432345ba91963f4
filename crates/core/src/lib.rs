//! Core storage logic for ystore.
//!
//! This crate contains the document storage contract with ZERO web or database
//! dependencies. Relational storage lives in `ystore-db`; HTTP delivery lives in
//! `ystore-runtime`.
//!
//! # Modules
//!
//! - `address` - Fragment key encoding and decoding
//! - `crdt` - Merge and state-vector helpers over `yrs`
//! - `storage` - Fragment store primitives and the document storage contract
//! - `compaction` - Replacing many fragments with one merged fragment

pub mod address;
pub mod compaction;
pub mod crdt;
pub mod storage;

pub use address::FragmentAddress;
pub use storage::{DocumentStorage, FragmentStorage, RetrievedDoc, StorageError, StorageReference};
