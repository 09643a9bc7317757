//! # Garden Client Library
//!
//! Clients for the shared garden server. Two kinds of peers talk to it:
//!
//! ### Gardeners (`network`)
//! A gardener connects to the task port, learns the field size and then sends
//! one task per plot it wants worked. Every task is resent until the server
//! acknowledges it, and a final task marked done ends the session.
//!
//! ### Observers (`observer`)
//! An observer connects to the observer port and prints every line the server
//! pushes until the connection closes or the terminator line `0` arrives.
//!
//! ### Sweeps (`sweep`)
//! The stock gardeners walk the field in a fixed snake order; see
//! [`sweep::SweepOrder`].
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use garden_client::network::GardenerClient;
//! use garden_client::sweep::SweepOrder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), garden_client::error::ClientError> {
//!     let gardener = GardenerClient::connect("127.0.0.1:8080", 1, 100).await?;
//!     let worked = gardener.run_sweep(SweepOrder::Rows).await?;
//!     println!("worked {} plots", worked);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod network;
pub mod observer;
pub mod sweep;
