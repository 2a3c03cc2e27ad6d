//! The time-slotted simulation harness.
//!
//! The simulator owns the clock, both channel models, the RNG and the
//! node table. Each slot activates exactly one node in round-robin order;
//! the node may emit messages, which the harness resolves through the
//! appropriate channel and delivers, ACKs included. A repeating clock
//! alarm injects application traffic at a fixed cadence, independent of
//! the slot rotation.
//!
//! Everything is single-threaded and deterministic: equal seeds and equal
//! configuration replay identical simulations.

use std::collections::HashMap;

use crate::channel::{AcousticChannel, OpticalChannel};
use crate::config::SimConfig;
use crate::error::{Result, UoarError};
use crate::modem::{AcousticModem, OpticalModem};
use crate::protocol::messages::{Addr, Message, BROADCAST_ADDR};
use crate::protocol::node::Node;
use crate::sim::clock::Clock;
use crate::sim::rng::SimRng;

/// Global transmission-attempt counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimStats {
    pub acoustic_transmissions: u64,
    pub optical_transmissions: u64,
}

/// Discrete-event simulator for a UOAR network.
pub struct Simulator {
    config: SimConfig,
    achannel: AcousticChannel,
    ochannel: OpticalChannel,
    clock: Clock,
    rng: SimRng,

    /// Rotation offset carried across runs.
    first_node: usize,
    nodes_updated: bool,
    nodes: HashMap<Addr, Node>,
    /// Registration order; drives the slot rotation and every delivery
    /// iteration, keeping runs deterministic.
    order: Vec<Addr>,
    aneighbors: HashMap<Addr, Vec<Addr>>,
    oneighbors: HashMap<Addr, Vec<Addr>>,

    stats: SimStats,
}

impl Simulator {
    /// Build a simulator from a validated configuration.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let achannel = AcousticChannel::new(
            config.acoustic.spreading_factor,
            config.acoustic.shipping_activity,
            config.acoustic.wind_speed,
        )?;
        let ochannel = OpticalChannel::new(config.optical.attenuation, config.optical.temperature);
        let rng = SimRng::new(config.seed);
        Ok(Self {
            config,
            achannel,
            ochannel,
            clock: Clock::new(),
            rng,
            first_node: 0,
            nodes_updated: true,
            nodes: HashMap::new(),
            order: Vec::new(),
            aneighbors: HashMap::new(),
            oneighbors: HashMap::new(),
            stats: SimStats::default(),
        })
    }

    /// Register a node. Re-registering an address replaces the node but
    /// keeps its slot position.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        let addr = node.addr();
        if addr == BROADCAST_ADDR {
            return Err(UoarError::ReservedAddress(BROADCAST_ADDR));
        }
        if self.nodes.insert(addr, node).is_none() {
            self.order.push(addr);
        }
        self.nodes_updated = false;
        Ok(())
    }

    pub fn node(&self, addr: Addr) -> Option<&Node> {
        self.nodes.get(&addr)
    }

    pub fn node_mut(&mut self, addr: Addr) -> Option<&mut Node> {
        self.nodes.get_mut(&addr)
    }

    /// Current virtual time, in seconds.
    pub fn time(&self) -> f64 {
        self.clock.read()
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Node addresses in registration (slot-rotation) order.
    pub fn node_addrs(&self) -> &[Addr] {
        &self.order
    }

    /// Rebuild the static acoustic/optical neighbor maps from node
    /// positions.
    fn update_nodes_info(&mut self) {
        tracing::debug!(nodes = self.order.len(), "rebuilding neighbor maps");
        for &addr1 in &self.order {
            let mut aneighbors = Vec::new();
            let mut oneighbors = Vec::new();
            let pos1 = match self.nodes.get(&addr1) {
                Some(node) => node.position(),
                None => continue,
            };
            for &addr2 in &self.order {
                if addr1 == addr2 {
                    continue;
                }
                let pos2 = match self.nodes.get(&addr2) {
                    Some(node) => node.position(),
                    None => continue,
                };
                let distance = pos1.distance(&pos2);
                if distance <= AcousticModem::MAX_RANGE {
                    aneighbors.push(addr2);
                }
                if distance <= OpticalModem::MAX_RANGE {
                    oneighbors.push(addr2);
                }
            }
            self.aneighbors.insert(addr1, aneighbors);
            self.oneighbors.insert(addr1, oneighbors);
        }
        self.nodes_updated = true;
    }

    /// Feed the routing layer with one application message per live,
    /// non-sink node.
    fn inject_app_messages(&mut self) {
        let now = self.clock.read();
        let sink = match self.config.sink_addrs.first() {
            Some(&sink) => sink,
            None => return,
        };
        tracing::debug!(now, "injecting application traffic");
        for i in 0..self.order.len() {
            let addr = self.order[i];
            if let Some(node) = self.nodes.get_mut(&addr) {
                if node.energy() > 0.0 && !node.is_sink() {
                    node.generate_app_message(sink, now);
                }
            }
        }
    }

    /// Advance the clock, dispatching the traffic alarm when it fires.
    fn advance(&mut self, time: f64) {
        if self.clock.run(time) {
            self.inject_app_messages();
        }
    }

    /// Run the simulation for `stop_exec` seconds of virtual time.
    ///
    /// Can be called repeatedly; the slot rotation and clock carry over,
    /// so a second run continues where the first stopped.
    pub fn run(&mut self, stop_exec: f64) -> Result<()> {
        if stop_exec <= 0.0 {
            return Err(UoarError::Config(format!(
                "execution time must be positive, got {stop_exec}"
            )));
        }
        self.config.validate()?;
        if self.nodes.is_empty() {
            return Err(UoarError::Config("no nodes registered".into()));
        }

        if !self.clock.alarm_is_on() {
            if let (Some(start), Some(interval)) = (self.config.app_start, self.config.app_interval)
            {
                let stop = self.config.app_stop.unwrap_or(f64::INFINITY);
                self.clock.set_alarm(start, interval, stop);
            }
        }

        let interval = self.config.slot_duration();
        if !self.nodes_updated {
            self.update_nodes_info();
        }

        let chunk: Vec<u8> = (0..self.config.app_chunk_size())
            .map(|i| i as u8)
            .collect();
        for i in 0..self.order.len() {
            let addr = self.order[i];
            if let Some(node) = self.nodes.get_mut(&addr) {
                node.set_app_payload(chunk.clone());
            }
        }

        let num_slots = (stop_exec / interval) as usize;
        tracing::info!(num_slots, interval, "simulation started");

        for slot in 0..num_slots {
            let index = (self.first_node + slot) % self.order.len();
            let addr = self.order[index];

            // Depleted nodes lose their slot but time still passes.
            let depleted = self.nodes.get(&addr).map_or(true, |n| n.energy() <= 0.0);
            if depleted {
                tracing::trace!(addr, "skipping depleted node");
                self.advance(interval);
                continue;
            }

            let mut remaining = interval;
            let mut new_slot = true;
            while remaining > 0.0 {
                let now = self.clock.read();
                let (spent, msg) = match self.nodes.get_mut(&addr) {
                    Some(node) => node.execute(now, remaining, new_slot),
                    None => break,
                };
                new_slot = false;
                let msg = match msg {
                    Some(msg) => msg,
                    None => {
                        self.advance(remaining);
                        break;
                    }
                };
                remaining -= spent;
                self.advance(spent);
                remaining = self.resolve(msg, remaining);
            }
            assert!(
                remaining >= 0.0,
                "node {addr} overran its time slot by {} s",
                -remaining
            );
        }

        if num_slots > 0 {
            self.first_node = (self.first_node + num_slots - 1) % self.order.len() + 1;
        }
        tracing::info!(
            elapsed = self.clock.read(),
            acoustic = self.stats.acoustic_transmissions,
            optical = self.stats.optical_transmissions,
            "simulation finished"
        );
        Ok(())
    }

    /// Put one emitted message on the channel: fan out, draw delivery
    /// outcomes, hand delivered copies to the receivers and shepherd any
    /// resulting ACK back. Returns the sender's remaining slot budget.
    fn resolve(&mut self, msg: Message, mut remaining: f64) -> f64 {
        let acoustic = msg.is_acoustic();
        let need_ack = msg.with_ack();

        let destinations: Vec<Addr> = if msg.dst == BROADCAST_ADDR {
            assert!(acoustic, "node {}: optical broadcasts are not allowed", msg.src);
            self.stats.acoustic_transmissions += 1;
            match self.aneighbors.get(&msg.src) {
                Some(list) => list.clone(),
                None => panic!("no neighbor map for node {}", msg.src),
            }
        } else {
            vec![msg.dst]
        };

        let src_pos = match self.nodes.get(&msg.src) {
            Some(node) => node.position(),
            None => panic!("message from unregistered node {}", msg.src),
        };

        for dst in destinations {
            let dst_pos = match self.nodes.get(&dst) {
                Some(node) => node.position(),
                None => panic!("delivery to unregistered address {dst}"),
            };
            let dist = src_pos.distance(&dst_pos);

            let delivered = self.draw(acoustic, dist, msg.encoded_len());
            if !delivered {
                tracing::debug!(src = msg.src, dst, "message lost on the channel");
                continue;
            }

            let now = self.clock.read();
            let ack = match self.nodes.get_mut(&dst) {
                Some(node) => node.recv_msg(now, &msg),
                None => None,
            };

            if need_ack {
                // The sender budgeted the receiver's full ACK round trip;
                // charge it whether or not the ACK materialized.
                let ack_time = self.nodes.get(&dst).map_or(0.0, |node| {
                    if acoustic {
                        node.acoustic_ack_time()
                    } else {
                        node.optical_ack_time()
                    }
                });
                remaining -= ack_time;
                self.advance(ack_time);

                match ack {
                    Some(ack) => {
                        let delivered = self.draw(ack.is_acoustic(), dist, ack.encoded_len());
                        if delivered {
                            let now = self.clock.read();
                            match self.nodes.get_mut(&ack.dst) {
                                Some(sender) => {
                                    sender.recv_msg(now, &ack);
                                }
                                None => panic!("ack to unregistered address {}", ack.dst),
                            }
                        } else {
                            tracing::debug!(src = dst, dst = ack.dst, "ack lost on the channel");
                        }
                    }
                    None => tracing::debug!(dst, "receiver could not produce an ack"),
                }
            }
        }
        remaining
    }

    /// Draw one channel outcome and count the attempt.
    fn draw(&mut self, acoustic: bool, dist: f64, size: usize) -> bool {
        if acoustic {
            self.stats.acoustic_transmissions += 1;
            self.achannel.transmit(
                AcousticModem::FREQUENCY,
                AcousticModem::TX_POWER,
                dist,
                size,
                &self.rng,
            )
        } else {
            self.stats.optical_transmissions += 1;
            self.ochannel.transmit(
                OpticalModem::TX_POWER,
                dist,
                dist,
                self.config.optical.inclination,
                size,
                &self.rng,
            )
        }
    }
}
