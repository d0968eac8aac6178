//! Document persistence for fleet
//!
//! This crate provides the storage layer every coordination component is built on:
//! - Named JSON documents replaced atomically (temp file + rename)
//! - Append-only line-delimited logs
//! - Advisory locks scoped to a resource key
//! - A filesystem store and an in-memory store with the same semantics

pub mod storage;

pub use storage::{
    DocumentStore, LocalDocumentStore, MemoryDocumentStore, ResourceLock, StoreError, StoreExt,
    StoreResult,
};
