//! Fragment-based document storage.
//!
//! This module provides the storage contract shared by every backend:
//! - `FragmentStore` - put/list/get/delete primitives a medium must offer
//! - `DocumentStorage` - persist, retrieve, state vector, delete references, destroy
//! - `FragmentStorage` - the one implementation of the contract, generic over the medium
//! - `ObjectStore` - OpenDAL-backed medium: S3-compatible, GCS, in-memory (development only)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 DocumentStorage (FragmentStorage<B>)             │
//! │  persist_doc ─► put(room/doc/<uuid>)                             │
//! │  retrieve_doc ─► list(room/doc/) ─► get(each) ─► merge           │
//! │  delete_references ─► delete(each given reference)               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   FragmentStore: ObjectStore (OpenDAL) │ relational (ystore-db)  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod backend;
mod config;
mod document;
mod error;
mod object;

pub use backend::FragmentStore;
pub use config::ObjectStoreProvider;
pub use document::{DocumentStorage, FragmentStorage, RetrievedDoc, StorageReference};
pub use error::StorageError;
pub use object::ObjectStore;
