//! # stringkv - A Redis-Compatible String Command Server
//!
//! stringkv is an in-memory key-value server that speaks RESP2 and implements
//! the Redis string command family: plain and conditional writes, integer and
//! float counters, substring reads and bit operations.
//!
//! ## Architecture
//!
//! ```text
//!  TcpListener ── accept ──> ConnectionHandler (one Tokio task per client)
//!                                │
//!                                │ RequestParser: bytes -> argv
//!                                ▼
//!                           CommandHandler
//!                 lookup -> arity -> initial() -> lock(keys) -> execute()
//!                                                    │
//!                                                    ▼
//!                  StorageEngine: 64 RwLock shards, KeyspaceGuard per command
//!                                                    ▲
//!                  ExpirySweeper (background task) ──┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use bytes::Bytes;
//! use stringkv::{CommandHandler, StorageEngine};
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
//!
//! let set: Vec<Bytes> = vec!["SET".into(), "visits".into(), "41".into()];
//! assert_eq!(handler.run(&set), "+OK\r\n");
//!
//! let incr: Vec<Bytes> = vec!["INCR".into(), "visits".into()];
//! assert_eq!(handler.run(&incr), ":42\r\n");
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: request parser, reply builder and result codes
//! - [`storage`]: sharded keyspace with lazy and active expiry
//! - [`commands`]: command lifecycle and every command implementation
//! - [`connection`]: client connection management
//! - [`args`]: strict numeric parsing and formatting helpers
//!
//! ## Design Highlights
//!
//! ### Two-Phase Commands
//!
//! A command first validates its arguments and declares its keys without
//! touching the keyspace. The dispatcher then write-locks the shards of those
//! keys in ascending order and runs the command against them, so multi-key
//! commands such as MSET and BITOP are atomic.
//!
//! ### Integer Encoding
//!
//! String values whose bytes are a canonical decimal integer are stored as
//! an `i64`, which makes INCR-family commands cheap. Every reader sees the
//! decoded bytes regardless of encoding.
//!
//! ### Lazy + Active Expiry
//!
//! Expiry is checked on every access using the time at which the command
//! took its locks; a background task reclaims keys that are never read again.

pub mod args;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::{CommandHandler, CommandTable};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, ReplyBuilder, RequestParser, RespReply, ResultCode};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine};

/// The default port the server listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host the server binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
