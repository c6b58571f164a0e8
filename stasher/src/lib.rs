//! Stasher: a Kademlia DHT core for I2P-style SAM destinations.
//!
//! See `SPEC_FULL.md` at the workspace root for the full module map. This
//! crate is transport-agnostic (see [`transport::Transport`]) so it can run
//! over a real SAM bridge socket or, as in its own test suite, over an
//! in-process [`transport::MemoryNetwork`].

pub mod bucket;
pub mod codec;
pub mod config;
pub mod error;
pub mod id;
pub mod logging;
pub mod message;
pub mod node;
pub mod peer;
pub mod reactor;
pub mod rpc;
pub mod store;
pub mod transport;

pub use config::StasherConfig;
pub use error::{StasherError, StasherResult};
pub use id::Identifier;
pub use node::{Node, NodeOptions};
pub use peer::Peer;
