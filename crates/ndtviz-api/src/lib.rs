// ndtviz-api: wire types and transports for the telemetry backend
// (WebSocket push feed, topology/lab HTTP fetches, containerlab files).

pub mod clab;
pub mod client;
pub mod error;
pub mod transport;
pub mod websocket;
pub mod wire;

pub use client::BackendClient;
pub use error::Error;
pub use websocket::{FeedHandle, ReconnectConfig};
pub use wire::{ControlIntent, FeedMessage, TopologyGraph, TopologyLink, TopologyNode};
