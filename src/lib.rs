//! Line Chat Relay Library
//!
//! A text-line chat relay over any reliable byte stream: clients send
//! newline-terminated commands and the relay fans messages out to everyone
//! online or to one named recipient.
//!
//! # Commands
//! - `who`: list everyone online (reply to the requester only)
//! - `rename|<newName>`: change display name
//! - `to|<target>|<body>`: direct message
//! - anything else: broadcast as `[addr]name:body`
//!
//! # Architecture
//! - `Registry` is the one shared table (name -> session), behind one lock
//! - `Broadcaster` funnels every publish through a single relay task, the
//!   ordering point for fan-out
//! - Each connection runs a read loop, a writer task draining its outbound
//!   queue, and an `IdleMonitor` that evicts silent sessions
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use line_relay::{Engine, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8888").await.unwrap();
//!     let engine = Engine::start(RelayConfig::default());
//!
//!     while let Ok((stream, addr)) = listener.accept().await {
//!         let engine = engine.clone();
//!         tokio::spawn(async move { engine.serve_connection(stream, addr.to_string()).await });
//!     }
//! }
//! ```

pub mod broadcaster;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handler;
pub mod idle;
pub mod message;
pub mod registry;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcaster::Broadcaster;
pub use config::RelayConfig;
pub use engine::Engine;
pub use error::{MalformedReason, RelayError, SendError};
pub use idle::{IdleMonitor, MonitorOutcome};
pub use message::{ClientCommand, ServerNotice};
pub use registry::Registry;
pub use session::{Session, SessionHandle};
pub use types::{SessionId, TeardownReason};
