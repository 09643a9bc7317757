//! # Garden Server Library
//!
//! This library provides the authoritative server for the shared garden. Many
//! gardener clients work plots of one field at the same time; the server owns
//! the field, serializes conflicting work and streams an audit trail of every
//! change to the operator console and to any number of remote observers.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Field
//! The field is created once at startup with a random share of blocked plots.
//! A plot claimed by a gardener keeps that gardener's id for the rest of the
//! run, no matter how many others work it afterwards.
//!
//! ### Zone Locking
//! Plots are grouped into 2x2 zones sharing one lock. A gardener holds the
//! zone lock for the whole time it works a plot, so neighbours in the same
//! zone wait while other zones proceed in parallel.
//!
//! ### Event Streaming
//! Sessions publish map snapshots, action narration and connection notes to
//! an event bus. One pump task drains the bus in order and feeds the console
//! and the observer roster, giving every consumer the same global order.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Every accepted gardener connection runs its own [`session::TaskSession`]
//! on a tokio task. Sessions share the [`garden::Garden`] (field plus zone
//! locks) through an `Arc`; a failing connection only ends its own session.
//!
//! ### Explicit Shutdown
//! A `CancellationToken` replaces signal handlers. Sessions observe it while
//! waiting on their socket, never while holding a zone lock, and the
//! [`lifecycle::Lifecycle`] tears resources down in a fixed order.
//!
//! ## Module Organization
//!
//! - `field`, `zones`, `garden`: the shared field and its locks
//! - `session`: the per-gardener task protocol
//! - `events`, `console`, `observers`: the event bus and its consumers
//! - `dispatcher`, `lifecycle`, `server`: connection handling and shutdown
//! - `config`, `error`: configuration and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use garden_server::config::ServerConfig;
//! use garden_server::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 8x8 field, gardeners on 8080, observers on 8081
//!     let server = Server::bind(ServerConfig::new("127.0.0.1", 8080, 4)).await?;
//!
//!     let shutdown = server.shutdown_token();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.cancel();
//!     });
//!
//!     let report = server.run().await;
//!     println!("{:?}", report);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod field;
pub mod garden;
pub mod lifecycle;
pub mod observers;
pub mod server;
pub mod session;
pub mod zones;
