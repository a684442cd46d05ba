//! KST chat client runtime
//!
//! Runs a [`kst_core::Session`] over TCP on tokio. A [`ChatClient`] handle
//! enqueues commands for a single client task; everything that happens is
//! published on a broadcast [`EventStream`].
//!
//! # Example
//!
//! ```no_run
//! use kst_client::{ChatClient, ClientConfig, SystemEnv};
//! use kst_core::Credentials;
//! use kst_proto::Room;
//!
//! # async fn run() -> Result<(), kst_client::ClientError> {
//! let (client, _task) = ChatClient::spawn(SystemEnv::new(), ClientConfig::default());
//! let mut events = client.subscribe();
//! client.connect(Credentials::new("W1ABC", "secret"), Room::default(), None)?;
//! while let Ok(event) = events.recv().await {
//!     tracing::info!(?event, "chat event");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod handle;
pub mod highlight;
pub mod notify;
mod runtime;
pub mod system_env;
pub mod transport;

pub use config::{ClientConfig, DEFAULT_SERVER, KeepaliveConfig};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::ClientError;
pub use handle::{ChatClient, EventStream};
pub use highlight::{HighlightRuleEvaluator, KeywordRules};
pub use notify::NotificationSink;
pub use system_env::SystemEnv;
