//! Storage Engine Module
//!
//! A sharded in-memory keyspace with per-key expiry, the
//! [`KeyspaceService`] port that commands run against, and the background
//! expiry sweeper.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use stringkv::storage::{KeyspaceService, StorageEngine, StringValue};
//! use bytes::Bytes;
//!
//! let engine = StorageEngine::new();
//!
//! let mut ks = engine.lock(&["name"]);
//! ks.set_value(Bytes::from("name"), StringValue::from_bytes("Ariz").into());
//! let value = ks.get_string(b"name").unwrap().unwrap();
//! assert_eq!(&*value.decoded(), b"Ariz");
//! ```

pub mod engine;
pub mod expiry;
pub mod keyspace;
pub mod value;

pub use engine::{unix_millis, KeyspaceGuard, StorageEngine, NUM_SHARDS};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use keyspace::{KeyspaceError, KeyspaceService};
pub use value::{Encoding, StringValue, Value, ValueType};
