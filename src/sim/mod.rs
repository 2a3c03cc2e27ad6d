//! Deterministic discrete-event simulation of a UOAR network.
//!
//! # Overview
//!
//! The simulation machinery provides:
//! - **Virtual time**: an explicit clock, no real delays
//! - **Deterministic execution**: same seed = same trace, every time
//! - **Time-slotted scheduling**: one node active per slot, round-robin
//! - **Channel resolution**: every emitted message and ACK is drawn
//!   through the acoustic or optical channel model
//!
//! # Example
//!
//! ```ignore
//! use uoar_sim::{Node, Position, SimConfig, Simulator};
//!
//! let config = SimConfig::new()
//!     .with_packet_size(64)
//!     .with_app_traffic(50.0, 10.0)
//!     .with_seed(42);
//!
//! let mut sim = Simulator::new(config)?;
//! sim.add_node(Node::new(1, Position::new(0.0, 0.0, 0.0), 100.0, true))?;
//! sim.add_node(Node::new(2, Position::new(10.0, 0.0, 0.0), 100.0, false))?;
//! sim.run(300.0)?;
//!
//! let stats = sim.stats();
//! ```
//!
//! # Components
//!
//! - [`Clock`]: monotonic virtual clock with one repeating alarm
//! - [`SimRng`]: seeded xorshift64 random number generator
//! - [`Simulator`]: slot scheduler, delivery loop and statistics

pub mod clock;
pub mod harness;
pub mod rng;

#[cfg(test)]
mod integration;

pub use clock::Clock;
pub use harness::{SimStats, Simulator};
pub use rng::SimRng;
