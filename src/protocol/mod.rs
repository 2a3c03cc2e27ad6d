//! The UOAR protocol: wire messages and the per-node engine.
//!
//! [`messages`] is the pure data layer — the wire fields, flag bits and
//! factory constructors for every message kind. [`node`] is the engine
//! that speaks it: cluster-head election, routing-tree construction,
//! reliable delivery with retries, energy accounting and failure
//! recovery, driven one slot at a time by the simulation harness.

pub mod messages;
pub mod node;

pub use messages::{
    Addr, DataBody, Message, MessageKind, Payload, BASIC_TTL, BROADCAST_ADDR, HEADER_SIZE,
};
pub use node::{Node, NodeState, NodeStatus, MAX_TRANSMISSIONS, MSGS_LOST_LIMIT};
