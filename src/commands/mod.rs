//! Command Module
//!
//! This module implements the command execution layer. It receives parsed
//! argument vectors, runs them against the storage engine and writes replies
//! through a [`ReplyBuilder`](crate::protocol::ReplyBuilder).
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ RequestParser   │  (protocol module)
//! └────────┬────────┘
//!          │ argv
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (handler)
//! │                 │
//! │  - Lookup       │
//! │  - Arity        │
//! │  - initial()    │
//! │  - execute()    │
//! └────────┬────────┘
//!          │ KeyspaceService
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `GET`, `SET`, `SETNX`, `SETEX`, `PSETEX`, `GETSET`
//! - `MGET`, `MSET`, `APPEND`, `STRLEN`, `GETRANGE`
//! - `INCR`, `DECR`, `INCRBY`, `DECRBY`, `INCRBYFLOAT`
//! - `BITCOUNT`, `GETBIT`, `SETBIT`, `BITOP`
//!
//! ### Key and Connection Commands
//! - `DEL`, `EXISTS`, `TYPE`, `TTL`, `PTTL`, `PING`
//!
//! ### Set Commands
//! - `SADD`, `SISMEMBER`

pub mod base;
pub mod bitops;
pub mod generic;
pub mod handler;
pub mod set;
pub mod string;

pub use base::{AclCategory, Command, CommandContext, CommandFlags, CommandSpec};
pub use handler::{CommandHandler, CommandTable};
