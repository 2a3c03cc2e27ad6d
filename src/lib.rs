//! Discrete-event simulator for UOAR, an underwater wireless sensor
//! network clustering-and-routing protocol over dual acoustic/optical
//! transports.
//!
//! UOAR organizes sensor nodes into optical-range clusters whose heads
//! form an acoustic backbone toward one or more surface sinks:
//!
//! - **Hybrid links**: short-range, fast optical inside a cluster;
//!   long-range, slow acoustic between heads and toward the sink
//! - **Distributed election**: heads are chosen by a coverage-and-energy
//!   score, ties broken by address
//! - **Self-healing**: headship hand-off when energy drains, route
//!   recovery when a next hop goes silent
//! - **Deterministic replay**: one seeded RNG drives every random draw,
//!   so equal seeds reproduce identical runs
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                Simulator                    │
//! │   slot scheduler · delivery · statistics    │
//! │        │                        │           │
//! │        ▼                        ▼           │
//! │  ┌──────────┐            ┌────────────┐    │
//! │  │  Clock   │            │  Channels  │    │
//! │  │ + alarm  │            │ acou/opt   │    │
//! │  └──────────┘            └─────┬──────┘    │
//! │        │                       │ PER draw   │
//! │        ▼                       ▼            │
//! │  ┌─────────────────────────────────────┐   │
//! │  │               Nodes                  │   │
//! │  │  election · routing · outbox · ACKs  │   │
//! │  │  energy accounting · recovery        │   │
//! │  └─────────────────────────────────────┘   │
//! └────────────────────────────────────────────┘
//! ```
//!
//! # Protocol rounds
//!
//! A node walks through its phases one round at a time:
//!
//! 1. **Discovery**: broadcast identity, position and route quality
//! 2. **Announcement**: join a discovered cluster, or advertise a score
//! 3. **Election**: highest score becomes cluster head, rest join it
//! 4. **Routing**: heads build the backbone, members wait for a route
//! 5. **Steady state**: forward application data, retry with ACKs,
//!    update headship or recover routes as conditions change
//!
//! # Quick Start
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
//! sim.add_node(Node::new(2, Position::new(10.0, 0.0, 5.0), 100.0, false))?;
//! sim.add_node(Node::new(3, Position::new(20.0, 5.0, 8.0), 100.0, false))?;
//! sim.run(600.0)?;
//!
//! let sink = sim.node(1).unwrap();
//! println!(
//!     "delivered {} messages, avg {} hops",
//!     sink.data_received(),
//!     sink.avg_num_hops()
//! );
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod geometry;
pub mod modem;
pub mod protocol;
pub mod sim;

// Re-export main types at crate root
pub use channel::{AcousticChannel, OpticalChannel};
pub use config::{AcousticParams, OpticalParams, SimConfig};
pub use error::{Result, UoarError};
pub use geometry::{scatter_nodes, Position};
pub use modem::{AcousticModem, OpticalModem};
pub use protocol::{
    Addr, DataBody, Message, MessageKind, Node, NodeState, NodeStatus, Payload, BASIC_TTL,
    BROADCAST_ADDR, HEADER_SIZE, MAX_TRANSMISSIONS, MSGS_LOST_LIMIT,
};
pub use sim::{Clock, SimRng, SimStats, Simulator};
