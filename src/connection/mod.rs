//! Connection Handler Module
//!
//! Each accepted socket is served by a [`ConnectionHandler`] running in its
//! own task. The handler owns the input buffer, the request parser and a
//! reply buffer; command execution is delegated to a shared
//! [`CommandHandler`](crate::commands::CommandHandler).
//!
//! ## Example
//!
//! ```no_run
//! use stringkv::commands::CommandHandler;
//! use stringkv::connection::{handle_connection, ConnectionStats};
//! use stringkv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # async fn serve() -> std::io::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:6379").await?;
//! let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
//! let stats = Arc::new(ConnectionStats::new());
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats));
//! # Ok(())
//! # }
//! ```

pub mod handler;

pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, StatsSnapshot,
};
