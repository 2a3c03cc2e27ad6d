//! The per-node UOAR protocol engine.
//!
//! Two orthogonal machines drive a node. Its **state** is the routing role
//! (initial, cluster member, cluster head, dead); its **status** is the
//! phase of work within a round (discovery, announcement, election,
//! waiting, steady-state routing, headship update, failure recovery).
//! Status advances only at round boundaries; the harness flags those by
//! calling [`Node::execute`] with `new_slot` set.
//!
//! A node owns its energy, its neighbor and cluster bookkeeping, and an
//! outbox of pending unicasts with per-message retry counts. Channel
//! losses, unaffordable sends and missing ACKs are ordinary protocol
//! events here, never errors; the only fatal conditions are unreachable
//! state/status combinations, which indicate a defect.

use std::collections::{HashMap, VecDeque};

use crate::geometry::Position;
use crate::modem;
use crate::protocol::messages::{
    Addr, DataBody, Message, MessageKind, Payload, BASIC_TTL, BROADCAST_ADDR,
};

/// Retry cap per outbox message; reaching it drops the message.
pub const MAX_TRANSMISSIONS: u32 = 3;
/// Consecutive data losses that trigger the recovery phase.
pub const MSGS_LOST_LIMIT: u32 = 2;

/// Routing role. `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Initial,
    ClusterMember,
    ClusterHead,
    Dead,
}

/// Phase of work within the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Idle,
    Discovering,
    Announcing,
    Electing,
    Waiting,
    HeadWait,
    Ready,
    Updating,
    Recovering,
}

/// Progress of a headship update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdatePhase {
    Idle,
    Requested,
    Collecting,
}

#[derive(Debug, Clone)]
struct OutboxEntry {
    msg: Message,
    attempts: u32,
}

impl OutboxEntry {
    fn new(msg: Message) -> Self {
        Self { msg, attempts: 0 }
    }
}

/// A simulated sensor node running the UOAR protocol.
pub struct Node {
    addr: Addr,
    position: Position,
    is_sink: bool,

    energy: f64,
    max_energy: f64,
    critical_energy: bool,
    /// Remaining warning fractions, popped from the end as crossed.
    energy_thresholds: Vec<f64>,
    energy_threshold: f64,

    state: NodeState,
    status: NodeStatus,
    round: u64,

    /// Optical-range neighbors, address to position.
    oneighbors: HashMap<Addr, Position>,
    /// Estimate of nodes reachable anywhere in the network.
    num_reachable_nodes: u32,
    /// Best (score, address) seen during election or update.
    highest_score: (f64, Option<Addr>),
    next_hop: Option<Addr>,
    next_hop_dist: f64,
    hops_to_sink: Option<u32>,
    stop_waiting: bool,
    update_status: UpdatePhase,
    /// Neighboring heads, address to "has confirmed the route".
    chead_list: HashMap<Addr, bool>,
    cmember_list: Vec<Addr>,

    greater_distance: f64,
    avg_distance: f64,

    /// Fallback path through a member, for heads with no backbone route.
    min_hops_to_sink: Option<u32>,
    member_alternative: Option<Addr>,

    msgs_lost_count: u32,
    dead_node: Option<Addr>,

    waiting_ack: bool,
    outbox: VecDeque<OutboxEntry>,
    /// Application payload chunk; each node owns its copy.
    app_payload: Vec<u8>,

    // statistics
    recvd_msgs: u64,
    sent_msgs: u64,
    avg_num_hops: f64,
    max_num_hops: u32,
    avg_time_spent: f64,
    max_time_spent: f64,

    // reusable ACKs with precomputed round-trip times
    acoustic_ack: Message,
    acoustic_ack_time: f64,
    optical_ack: Message,
    optical_ack_time: f64,
}

impl Node {
    pub fn new(addr: Addr, position: Position, energy: f64, is_sink: bool) -> Self {
        let acoustic_ack = Message::acoustic_ack(addr, BROADCAST_ADDR);
        let (time, _) = modem::transmit_cost(acoustic_ack.encoded_len(), true);
        let acoustic_ack_time = 2.0 * time;
        let optical_ack = Message::optical_ack(addr, BROADCAST_ADDR);
        let (time, _) = modem::transmit_cost(optical_ack.encoded_len(), false);
        let optical_ack_time = 2.0 * time;

        Self {
            addr,
            position,
            is_sink,
            energy,
            max_energy: energy,
            critical_energy: false,
            energy_thresholds: vec![0.05, 0.2],
            energy_threshold: 0.5 * energy,
            state: NodeState::Initial,
            status: NodeStatus::Idle,
            round: 0,
            oneighbors: HashMap::new(),
            num_reachable_nodes: 0,
            highest_score: (0.0, None),
            next_hop: None,
            next_hop_dist: f64::INFINITY,
            hops_to_sink: None,
            stop_waiting: false,
            update_status: UpdatePhase::Idle,
            chead_list: HashMap::new(),
            cmember_list: Vec::new(),
            greater_distance: 0.0,
            avg_distance: 0.0,
            min_hops_to_sink: None,
            member_alternative: None,
            msgs_lost_count: 0,
            dead_node: None,
            waiting_ack: false,
            outbox: VecDeque::new(),
            app_payload: Vec::new(),
            recvd_msgs: 0,
            sent_msgs: 0,
            avg_num_hops: 0.0,
            max_num_hops: 0,
            avg_time_spent: 0.0,
            max_time_spent: 0.0,
            acoustic_ack,
            acoustic_ack_time,
            optical_ack,
            optical_ack_time,
        }
    }

    // ---- identity and bookkeeping accessors ----

    pub fn addr(&self) -> Addr {
        self.addr
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_sink(&self) -> bool {
        self.is_sink
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn max_energy(&self) -> f64 {
        self.max_energy
    }

    pub fn critical_energy(&self) -> bool {
        self.critical_energy
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn next_hop(&self) -> Option<Addr> {
        self.next_hop
    }

    pub fn hops_to_sink(&self) -> Option<u32> {
        self.hops_to_sink
    }

    pub fn optical_neighbor_count(&self) -> usize {
        self.oneighbors.len()
    }

    pub fn reachable_estimate(&self) -> u32 {
        self.num_reachable_nodes
    }

    pub fn msgs_lost(&self) -> u32 {
        self.msgs_lost_count
    }

    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    /// Round-trip time for an acoustic ACK, precomputed at construction.
    pub fn acoustic_ack_time(&self) -> f64 {
        self.acoustic_ack_time
    }

    /// Round-trip time for an optical ACK, precomputed at construction.
    pub fn optical_ack_time(&self) -> f64 {
        self.optical_ack_time
    }

    // ---- statistics accessors ----

    pub fn data_received(&self) -> u64 {
        self.recvd_msgs
    }

    pub fn data_sent(&self) -> u64 {
        self.sent_msgs
    }

    pub fn avg_num_hops(&self) -> f64 {
        self.avg_num_hops
    }

    pub fn max_num_hops(&self) -> u32 {
        self.max_num_hops
    }

    pub fn avg_latency(&self) -> f64 {
        self.avg_time_spent
    }

    pub fn max_latency(&self) -> f64 {
        self.max_time_spent
    }

    pub fn avg_neighbor_distance(&self) -> f64 {
        self.avg_distance
    }

    pub fn greatest_neighbor_distance(&self) -> f64 {
        self.greater_distance
    }

    // ---- scenario tooling ----

    /// Reposition the node. The harness recomputes its static neighbor
    /// maps before the next run.
    pub fn move_to(&mut self, x: f64, y: f64, depth: f64) {
        self.position = Position::new(x, y, depth);
    }

    /// Install the shared-size application payload chunk.
    pub fn set_app_payload(&mut self, chunk: Vec<u8>) {
        self.app_payload = chunk;
    }

    /// Enqueue one application-layer message toward `sink`.
    ///
    /// The application message is modeled as an optical data message for
    /// the sink, wrapped in a transport envelope addressed to the current
    /// next hop; members forward optically, everyone else acoustically.
    pub fn generate_app_message(&mut self, sink: Addr, now: f64) {
        let inner = Message::optical_data(self.addr, sink, DataBody::Chunk(self.app_payload.clone()), now);
        let body = DataBody::Nested(Box::new(inner));
        // The destination is refreshed from the live next hop at send
        // time; the broadcast address is only a placeholder here.
        let next = self.next_hop.unwrap_or(BROADCAST_ADDR);
        let outer = if self.state == NodeState::ClusterMember {
            Message::optical_data(self.addr, next, body, now)
        } else {
            Message::acoustic_data(self.addr, next, body, now)
        };
        self.outbox.push_back(OutboxEntry::new(outer));
    }

    /// Node score for cluster-head election.
    ///
    /// The sink always wins; a node that cannot reach anything beyond its
    /// own neighborhood scores zero; otherwise coverage and remaining
    /// energy contribute up to 100 points each, floored to integers.
    pub fn calculate_score(&self) -> f64 {
        if self.is_sink {
            f64::INFINITY
        } else if self.num_reachable_nodes as usize == self.oneighbors.len() {
            0.0
        } else {
            let n = (100.0 * self.oneighbors.len() as f64 / self.num_reachable_nodes as f64).floor();
            let e = (100.0 * self.energy / self.max_energy).floor();
            e + n
        }
    }

    // ---- slot execution ----

    /// Run the node for (part of) its time slot.
    ///
    /// Returns the elapsed time and at most one message to put on the
    /// channel. Phase messages consume the whole remaining slot; only
    /// READY outbox sends report their actual transmit time, so several
    /// can fit in one slot. `new_slot` marks the round boundary where the
    /// status machine advances.
    pub fn execute(&mut self, now: f64, max_time: f64, new_slot: bool) -> (f64, Option<Message>) {
        if self.energy <= 0.0 {
            if self.state != NodeState::Dead {
                tracing::info!(addr = self.addr, "node exhausted its energy");
                self.state = NodeState::Dead;
            }
            return (max_time, None);
        }

        self.check_energy_threshold();

        if new_slot {
            self.round += 1;
            tracing::trace!(addr = self.addr, round = self.round, now, "new round");
            self.advance_status();
        }

        let mut time = max_time;
        let mut msg = None;

        if self.state == NodeState::Initial {
            msg = Some(match self.status {
                NodeStatus::Discovering => self.discover_phase(),
                NodeStatus::Announcing => self.announce_phase(),
                NodeStatus::Electing => self.elect_phase(),
                other => panic!("node {}: unreachable initial status {other:?}", self.addr),
            });
        } else {
            match self.status {
                NodeStatus::Ready => {
                    let (t, m) = self.send_next_msg(max_time);
                    time = t;
                    msg = m;
                    return (time, msg);
                }
                NodeStatus::Waiting => {}
                NodeStatus::HeadWait => msg = self.head_wait_phase(),
                NodeStatus::Updating => msg = self.updating_phase(),
                NodeStatus::Recovering => msg = self.recover_phase(),
                other => panic!("node {}: unreachable cluster status {other:?}", self.addr),
            }
        }

        if let Some(m) = &msg {
            let (_, energy) = modem::transmit_cost(m.encoded_len(), m.is_acoustic());
            self.debit(energy);
        }
        (time, msg)
    }

    fn check_energy_threshold(&mut self) {
        if self.is_sink || self.critical_energy || self.energy > self.energy_threshold {
            return;
        }
        tracing::warn!(
            addr = self.addr,
            energy = self.energy,
            threshold = self.energy_threshold,
            "energy warning threshold crossed"
        );
        if let Some(fraction) = self.energy_thresholds.pop() {
            self.energy_threshold = fraction * self.max_energy;
        }
        if self.energy_thresholds.is_empty() {
            self.critical_energy = true;
        }
        if self.state == NodeState::ClusterHead && !self.cmember_list.is_empty() {
            self.update_status = UpdatePhase::Requested;
        }
    }

    /// Status machine, advanced once per round boundary.
    fn advance_status(&mut self) {
        use NodeStatus::*;
        let next = match self.status {
            Ready if self.msgs_lost_count == MSGS_LOST_LIMIT => Recovering,
            Ready if self.update_status == UpdatePhase::Requested => Updating,
            Ready => Ready,
            Idle => Discovering,
            Discovering => Announcing,
            Announcing => {
                if self.state == NodeState::Initial {
                    Electing
                } else {
                    Ready
                }
            }
            Electing => {
                if self.state == NodeState::ClusterMember {
                    Waiting
                } else {
                    HeadWait
                }
            }
            Waiting if self.stop_waiting => {
                if self.is_sink {
                    HeadWait
                } else {
                    Ready
                }
            }
            Waiting => Waiting,
            HeadWait if self.stop_waiting => Ready,
            HeadWait => HeadWait,
            Updating if self.update_status == UpdatePhase::Idle => Ready,
            Updating => Updating,
            Recovering if self.dead_node.is_none() && self.msgs_lost_count == 0 => Ready,
            Recovering => Recovering,
        };
        if next != self.status {
            tracing::trace!(addr = self.addr, from = ?self.status, to = ?next, "status");
            self.status = next;
        }
    }

    /// First round: announce position, role and route quality, then spend
    /// a round collecting the neighborhood's announcements.
    fn discover_phase(&mut self) -> Message {
        if self.is_sink {
            self.hops_to_sink = Some(0);
            self.stop_waiting = false;
        }
        tracing::debug!(addr = self.addr, "broadcasting info announcement");
        Message::info_announcement(self.addr, self.position, self.state, self.hops_to_sink)
    }

    /// Second round: join a discovered cluster outright, or announce the
    /// node's own score for the election.
    fn announce_phase(&mut self) -> Message {
        if self.next_hop.is_some() {
            // An in-range optical adoption wiped hops_to_sink to unknown
            // and joins as a member; an acoustic-range head adoption left
            // finite hops and makes this node a head itself.
            self.state = if self.hops_to_sink.is_none() {
                NodeState::ClusterMember
            } else {
                NodeState::ClusterHead
            };
            tracing::info!(addr = self.addr, state = ?self.state, "joined via discovered next hop");
            self.stop_waiting = false;
            Message::cluster_announcement(self.addr, false, self.position)
        } else {
            let score = self.calculate_score();
            if self.highest_score.0 < score {
                self.highest_score = (score, Some(self.addr));
            }
            tracing::debug!(addr = self.addr, score, "broadcasting score");
            Message::score_announcement(self.addr, score)
        }
    }

    /// Third round: the node with the highest seen score becomes head;
    /// everyone else joins it.
    fn elect_phase(&mut self) -> Message {
        let is_head = self.is_sink || self.highest_score.1 == Some(self.addr);
        if is_head {
            self.state = NodeState::ClusterHead;
            tracing::info!(addr = self.addr, "elected cluster head");
        } else {
            self.state = NodeState::ClusterMember;
            self.next_hop = self.highest_score.1;
            tracing::info!(addr = self.addr, head = ?self.next_hop, "joined as cluster member");
        }
        self.stop_waiting = false;
        Message::cluster_announcement(self.addr, is_head, self.position)
    }

    /// Heads re-broadcast their route until every tracked neighboring
    /// head has confirmed it; an unrouted head adopts the member fallback
    /// path when one was discovered.
    fn head_wait_phase(&mut self) -> Option<Message> {
        self.stop_waiting = false;
        if self.hops_to_sink.is_some() {
            if self.chead_list.values().all(|&got| got) {
                self.stop_waiting = true;
            } else {
                for (addr, got) in &self.chead_list {
                    if !got {
                        tracing::trace!(addr = self.addr, missing = addr, "route not yet confirmed");
                    }
                }
            }
            Some(Message::route_announcement(
                self.addr,
                true,
                self.next_hop,
                self.hops_to_sink,
                self.position,
            ))
        } else if self.member_alternative.is_some() {
            self.hops_to_sink = self.min_hops_to_sink;
            self.next_hop = self.member_alternative;
            self.stop_waiting = true;
            Some(Message::route_announcement(
                self.addr,
                true,
                self.next_hop,
                self.hops_to_sink,
                self.position,
            ))
        } else {
            None
        }
    }

    /// Two-step headship update: request neighbor scores, then hand off
    /// to a strictly better candidate if one replied.
    fn updating_phase(&mut self) -> Option<Message> {
        match self.update_status {
            UpdatePhase::Requested => {
                self.highest_score = (self.calculate_score(), Some(self.addr));
                self.update_status = UpdatePhase::Collecting;
                Some(Message::score_request(self.addr))
            }
            UpdatePhase::Collecting => {
                let mut out = None;
                if let Some(best) = self.highest_score.1 {
                    if best != self.addr {
                        tracing::info!(addr = self.addr, new_head = best, "handing off headship");
                        out = Some(Message::update_info(self.addr, best, self.next_hop));
                        self.next_hop = Some(best);
                        self.state = NodeState::ClusterMember;
                        self.chead_list.insert(best, true);
                        self.remove_member(best);
                    }
                }
                self.update_status = UpdatePhase::Idle;
                out
            }
            UpdatePhase::Idle => None,
        }
    }

    /// Dead-next-hop cleanup: mark the dead node, purge it from every
    /// table, then either resume with a surviving route or ask the
    /// neighborhood for one.
    fn recover_phase(&mut self) -> Option<Message> {
        let dead = match self.dead_node {
            Some(dead) => {
                if self.next_hop == Some(dead) {
                    // Nothing heard from the cluster since the loss.
                    self.state = NodeState::ClusterHead;
                }
                dead
            }
            None => {
                let dead = match self.next_hop {
                    Some(addr) => addr,
                    None => panic!("node {}: entered recovery without a next hop", self.addr),
                };
                tracing::info!(addr = self.addr, dead, "next hop presumed dead");
                self.dead_node = Some(dead);
                self.hops_to_sink = None;
                self.num_reachable_nodes = self.num_reachable_nodes.saturating_sub(1);
                dead
            }
        };

        self.chead_list.remove(&dead);
        self.remove_member(dead);
        self.oneighbors.remove(&dead);

        if self.state == NodeState::ClusterMember && self.oneighbors.is_empty() {
            self.state = NodeState::ClusterHead;
        }

        if self.next_hop != Some(dead) {
            // A replacement route arrived; resume as the current role.
            let out = if self.state == NodeState::ClusterHead {
                Some(Message::cluster_announcement(self.addr, true, self.position))
            } else {
                None
            };
            self.msgs_lost_count = 0;
            self.dead_node = None;
            out
        } else {
            Some(Message::route_info_request(self.addr, dead))
        }
    }

    // ---- outbox ----

    /// Send the head-of-outbox message if the slot budget and energy
    /// allow it.
    ///
    /// Messages at the retry cap are dropped first (counting data losses)
    /// until the outbox empties or the loss limit is hit. The survivor's
    /// destination and transport are refreshed to the node's current next
    /// hop and role before costing, so a just-updated route is used.
    fn send_next_msg(&mut self, remaining: f64) -> (f64, Option<Message>) {
        loop {
            match self.outbox.front() {
                None => return (0.0, None),
                Some(entry) if entry.attempts != MAX_TRANSMISSIONS => break,
                Some(_) => {}
            }
            if let Some(dropped) = self.outbox.pop_front() {
                tracing::warn!(
                    addr = self.addr,
                    kind = dropped.msg.type_name(),
                    "dropping message after retry cap"
                );
                if dropped.msg.kind() == Some(MessageKind::CommonData) {
                    self.msgs_lost_count += 1;
                }
                self.waiting_ack = false;
                if self.msgs_lost_count == MSGS_LOST_LIMIT || self.outbox.is_empty() {
                    return (0.0, None);
                }
            }
        }

        let (etime, eenergy, dst, with_ack, acoustic) = {
            let addr = self.addr;
            let next_hop = self.next_hop;
            let is_head = self.state == NodeState::ClusterHead;
            let entry = &mut self.outbox[0];
            if entry.msg.kind() == Some(MessageKind::CommonData) {
                entry.msg.dst = match next_hop {
                    Some(hop) => hop,
                    None => panic!("node {addr}: data message queued with no next hop"),
                };
                entry.msg.set_transport(is_head);
            }
            let (t, e) = modem::transmit_cost(entry.msg.encoded_len(), entry.msg.is_acoustic());
            (t, e, entry.msg.dst, entry.msg.with_ack(), entry.msg.is_acoustic())
        };

        let mut time = 0.0;
        let mut sent = None;
        if dst == BROADCAST_ADDR {
            // Broadcasts carry no ACK, so they go out exactly once.
            if etime < remaining && eenergy < self.energy {
                if let Some(entry) = self.outbox.pop_front() {
                    sent = Some(entry.msg);
                }
                self.debit(eenergy);
                time = etime;
            } else {
                tracing::debug!(addr = self.addr, remaining, "slot budget too small to broadcast");
            }
        } else if with_ack {
            let round_trip = etime
                + if acoustic {
                    self.acoustic_ack_time
                } else {
                    self.optical_ack_time
                };
            if round_trip < remaining && eenergy < self.energy {
                let entry = &mut self.outbox[0];
                entry.attempts += 1;
                sent = Some(entry.msg.clone());
                self.waiting_ack = true;
                self.debit(eenergy);
                time = etime;
            } else {
                tracing::debug!(addr = self.addr, remaining, "round trip does not fit the slot");
            }
        } else {
            tracing::debug!(addr = self.addr, "unicast without acknowledgment in outbox");
        }

        if let Some(msg) = &sent {
            if msg.kind() == Some(MessageKind::CommonData) {
                self.sent_msgs += 1;
            }
        }
        (time, sent)
    }

    // ---- reception ----

    /// Receive a delivered message.
    ///
    /// Gated on the energy needed to listen for it; on success the message
    /// is handled and, when it requested acknowledgment, the reusable ACK
    /// is re-addressed to the sender and returned if the node can still
    /// afford to transmit it.
    pub fn recv_msg(&mut self, now: f64, msg: &Message) -> Option<Message> {
        let (_, energy_to_recv) = modem::receive_cost(msg.encoded_len(), msg.is_acoustic());
        if self.energy < energy_to_recv {
            tracing::debug!(
                addr = self.addr,
                energy = self.energy,
                needed = energy_to_recv,
                "not enough energy to receive"
            );
            return None;
        }
        self.debit(energy_to_recv);
        self.handle_message(now, msg);

        if msg.with_ack() {
            let ack = if msg.is_acoustic() {
                self.acoustic_ack.dst = msg.src;
                self.acoustic_ack.clone()
            } else {
                self.optical_ack.dst = msg.src;
                self.optical_ack.clone()
            };
            let (_, energy) = modem::transmit_cost(ack.encoded_len(), ack.is_acoustic());
            if self.energy > energy {
                self.debit(energy);
                return Some(ack);
            }
        }
        None
    }

    // ---- message handling ----

    fn handle_message(&mut self, now: f64, msg: &Message) {
        let Some(kind) = msg.kind() else {
            tracing::warn!(addr = self.addr, flags = msg.flags, "ignoring unknown message kind");
            return;
        };
        tracing::debug!(addr = self.addr, src = msg.src, kind = kind.type_name(), "handling");
        match (kind, &msg.payload) {
            (MessageKind::CommonData, Payload::Data(body)) => self.handle_data(now, body),
            (
                MessageKind::InfoAnnoun,
                Payload::Info {
                    position,
                    state,
                    hops_to_sink,
                },
            ) => self.handle_info(msg.src, *position, *state, *hops_to_sink),
            (MessageKind::ScoreAnnoun | MessageKind::RepScore, Payload::Score(score)) => {
                self.handle_score(msg.src, *score)
            }
            (MessageKind::ClusterAnnoun, Payload::Cluster { is_head, .. }) => {
                self.handle_cluster(msg.src, *is_head)
            }
            (
                MessageKind::RouteAnnoun,
                Payload::Route {
                    is_head,
                    next_hop,
                    hops_to_sink,
                    position,
                },
            ) => self.handle_route(msg.src, *is_head, *next_hop, *hops_to_sink, *position),
            (MessageKind::ReqScore, Payload::Empty) => self.handle_score_request(msg.src),
            (MessageKind::UpdateInfo, Payload::Update { new_head, next_hop }) => {
                self.handle_update(msg.src, *new_head, *next_hop)
            }
            (MessageKind::ReqRinfo, Payload::RouteRequest { dead_node }) => {
                self.handle_route_request(msg.src, *dead_node)
            }
            (
                MessageKind::RepRinfo,
                Payload::RouteReply {
                    hops_to_sink,
                    ..
                },
            ) => self.handle_route_reply(msg.src, *hops_to_sink),
            (MessageKind::Ack, _) => self.handle_ack(msg.src),
            (kind, _) => panic!(
                "node {}: {} message with mismatched payload",
                self.addr,
                kind.type_name()
            ),
        }
    }

    /// Relay or absorb a data message.
    fn handle_data(&mut self, now: f64, body: &DataBody) {
        let inner = match body {
            DataBody::Nested(inner) => inner.as_ref(),
            DataBody::Chunk(_) => {
                panic!("node {}: data message without a nested relay payload", self.addr)
            }
        };
        let mut inner = inner.clone();
        inner.ttl = inner.ttl.saturating_sub(1);
        let (inner_dst, inner_ttl, inner_ctime) = (inner.dst, inner.ttl, inner.ctime);

        if inner_dst != self.addr {
            if inner_ttl != 0 {
                let body = DataBody::Nested(Box::new(inner));
                let next = self.next_hop.unwrap_or(BROADCAST_ADDR);
                let fwd = if self.state == NodeState::ClusterMember {
                    Message::optical_data(self.addr, next, body, now)
                } else {
                    Message::acoustic_data(self.addr, next, body, now)
                };
                self.outbox.push_back(OutboxEntry::new(fwd));
            } else {
                tracing::debug!(addr = self.addr, "relay dropped, ttl exhausted");
            }
        }

        self.recvd_msgs += 1;
        if self.is_sink {
            // Running averages with the (n-1)/n correction factor.
            let corr = (self.recvd_msgs - 1) as f64 / self.recvd_msgs as f64;
            let hops = BASIC_TTL - inner_ttl;
            if hops > self.max_num_hops {
                self.max_num_hops = hops;
            }
            self.avg_num_hops = self.avg_num_hops * corr + hops as f64 / self.recvd_msgs as f64;

            let elapsed = now - inner_ctime;
            if elapsed > self.max_time_spent {
                self.max_time_spent = elapsed;
            }
            self.avg_time_spent = self.avg_time_spent * corr + elapsed / self.recvd_msgs as f64;
        }
    }

    /// Absorb a neighbor's info announcement.
    fn handle_info(
        &mut self,
        src: Addr,
        node_position: Position,
        node_state: NodeState,
        node_hops: Option<u32>,
    ) {
        self.num_reachable_nodes += 1;
        let dist = self.position.distance(&node_position);

        if node_state == NodeState::ClusterHead {
            self.chead_list.insert(src, node_hops.is_some());
        }
        if dist <= crate::modem::OpticalModem::MAX_RANGE {
            self.oneighbors.insert(src, node_position);
            if node_state == NodeState::ClusterMember && !self.cmember_list.contains(&src) {
                self.cmember_list.push(src);
            }
        }

        let factor = (self.num_reachable_nodes - 1) as f64 / self.num_reachable_nodes as f64;
        self.avg_distance = self.avg_distance * factor + dist / self.num_reachable_nodes as f64;
        if dist > self.greater_distance {
            self.greater_distance = dist;
        }

        if self.state == NodeState::Initial && !self.is_sink {
            // Unrouted: opportunistically join whoever is already placed.
            // An in-range node beats the current pick on distance; an
            // out-of-range head competes on hop count.
            if dist <= crate::modem::OpticalModem::MAX_RANGE {
                if node_state != NodeState::Initial {
                    let curr_dist = self
                        .next_hop
                        .and_then(|hop| self.oneighbors.get(&hop))
                        .map(|pos| self.position.distance(pos))
                        .unwrap_or(f64::INFINITY);
                    if dist < curr_dist {
                        self.next_hop = Some(src);
                        self.hops_to_sink = None;
                    }
                }
            } else if node_state == NodeState::ClusterHead {
                match self.hops_to_sink {
                    None => {
                        if self.next_hop.is_none() {
                            self.next_hop = Some(src);
                            self.hops_to_sink = node_hops.map(|h| h + 1);
                        }
                    }
                    Some(curr) => {
                        if let Some(hops) = node_hops {
                            if hops + 1 < curr {
                                self.next_hop = Some(src);
                                self.hops_to_sink = Some(hops + 1);
                            }
                        }
                    }
                }
            }
        }

        if self.state != NodeState::Initial
            && self.status != NodeStatus::Discovering
            && node_state == NodeState::Initial
        {
            // A newcomer needs routing context quickly; preempt the outbox
            // with a fresh info announcement.
            let info =
                Message::info_announcement(self.addr, self.position, self.state, self.hops_to_sink);
            match self.outbox.front().map(|entry| entry.msg.kind()) {
                Some(Some(MessageKind::InfoAnnoun)) => self.outbox[0] = OutboxEntry::new(info),
                Some(_) | None => self.outbox.push_front(OutboxEntry::new(info)),
            }
        }
    }

    /// Track the highest score seen, with ties going to the lower address.
    fn handle_score(&mut self, src: Addr, score: f64) {
        let consuming = matches!(
            self.status,
            NodeStatus::Announcing | NodeStatus::Discovering | NodeStatus::Updating
        );
        if !consuming || !self.oneighbors.contains_key(&src) {
            return;
        }
        let (best, holder) = self.highest_score;
        let wins = best < score
            || (best == score && holder.map_or(true, |addr| addr > src));
        if wins {
            self.highest_score = (score, Some(src));
        }
    }

    /// Classify the announcer as head or member and keep the two lists
    /// complementary.
    fn handle_cluster(&mut self, src: Addr, is_head: bool) {
        if is_head {
            if !self.chead_list.contains_key(&src) {
                let confirmed = !matches!(self.status, NodeStatus::Electing | NodeStatus::Announcing);
                self.chead_list.insert(src, confirmed);
            }
            self.remove_member(src);
        } else if self.oneighbors.contains_key(&src) && !self.cmember_list.contains(&src) {
            self.cmember_list.push(src);
            self.chead_list.remove(&src);
        }

        if self.oneighbors.contains_key(&src) && self.status == NodeStatus::Discovering {
            self.next_hop = Some(src);
        }
    }

    /// Fold a neighbor's advertised route into our own.
    fn handle_route(
        &mut self,
        src: Addr,
        node_is_head: bool,
        node_next_hop: Option<Addr>,
        hops: Option<u32>,
        node_position: Position,
    ) {
        // One more hop to go through the announcer.
        let node_hops = hops.map(|h| h + 1);

        if self.state == NodeState::ClusterHead {
            if node_is_head {
                let dist = self.position.distance(&node_position);
                self.chead_list.insert(src, true);
                let better = match (self.hops_to_sink, node_hops) {
                    (Some(mine), Some(theirs)) => {
                        mine > theirs || (mine == theirs && dist < self.next_hop_dist)
                    }
                    (None, Some(_)) => true,
                    (None, None) => dist < self.next_hop_dist,
                    (Some(_), None) => false,
                };
                if better {
                    self.hops_to_sink = node_hops;
                    self.next_hop = Some(src);
                    self.next_hop_dist = dist;
                }
            } else if !self.is_sink {
                if hops_lt(node_hops, self.min_hops_to_sink) {
                    self.min_hops_to_sink = node_hops;
                    self.member_alternative = Some(src);
                }

                if self.next_hop.is_some() && node_next_hop != Some(self.addr) {
                    let close_enough = match (node_hops, self.hops_to_sink) {
                        (Some(theirs), Some(mine)) => theirs <= mine + 1,
                        (Some(_), None) => true,
                        (None, None) => true,
                        (None, Some(_)) => false,
                    };
                    if self.oneighbors.contains_key(&src) && close_enough {
                        // Better to be a member than a head.
                        tracing::info!(addr = self.addr, via = src, "demoting to cluster member");
                        self.state = NodeState::ClusterMember;
                        self.next_hop = Some(src);
                        self.hops_to_sink = node_hops;
                        let cam = Message::cluster_announcement(self.addr, false, self.position);
                        self.outbox.push_front(OutboxEntry::new(cam));
                    }
                }
            }
        }

        if matches!(self.status, NodeStatus::Waiting | NodeStatus::Electing)
            && self.next_hop == Some(src)
        {
            // A member routed through the announcer can improve its path
            // and stop waiting for the backbone.
            if hops_lt(node_hops, self.min_hops_to_sink) {
                self.min_hops_to_sink = node_hops;
                let ram = Message::route_announcement(
                    self.addr,
                    false,
                    self.next_hop,
                    node_hops,
                    self.position,
                );
                self.outbox.push_front(OutboxEntry::new(ram));
            }
            self.stop_waiting = true;
        }
    }

    /// Reply to a score request with our own score, replacing any reply
    /// still waiting at the head of the outbox.
    fn handle_score_request(&mut self, src: Addr) {
        if !self.oneighbors.contains_key(&src) {
            return;
        }
        let reply = Message::score_reply(self.addr, src, self.calculate_score());
        match self.outbox.front().map(|entry| entry.msg.kind()) {
            Some(Some(MessageKind::RepScore)) => self.outbox[0] = OutboxEntry::new(reply),
            Some(_) => self.outbox.push_front(OutboxEntry::new(reply)),
            None => self.outbox.push_back(OutboxEntry::new(reply)),
        }
    }

    /// A head handed off; re-parent or adjust the bookkeeping.
    fn handle_update(&mut self, src: Addr, new_head: Addr, new_next_hop: Option<Addr>) {
        if new_head == self.addr {
            self.state = NodeState::ClusterHead;
            self.next_hop = new_next_hop;
        } else {
            if self.next_hop == Some(src) || self.oneighbors.contains_key(&new_head) {
                self.next_hop = Some(new_head);
            }
            self.chead_list.insert(new_head, true);
        }

        if self.oneighbors.contains_key(&new_head) {
            self.remove_member(new_head);
        }
        if self.oneighbors.contains_key(&src) {
            self.cmember_list.push(src);
        }
        self.chead_list.remove(&src);
    }

    /// Recovery: offer our route unless the requester is our own next hop
    /// or we route through the node it just lost.
    fn handle_route_request(&mut self, src: Addr, dead_node: Addr) {
        if Some(src) == self.next_hop || Some(dead_node) == self.next_hop {
            return;
        }
        let reply = if self.oneighbors.contains_key(&src) {
            Message::optical_route_info_reply(self.addr, src, self.next_hop, self.hops_to_sink)
        } else {
            Message::acoustic_route_info_reply(self.addr, src, self.next_hop, self.hops_to_sink)
        };
        self.outbox.push_front(OutboxEntry::new(reply));
    }

    /// Recovery: adopt a replier's route.
    fn handle_route_reply(&mut self, src: Addr, node_hops: Option<u32>) {
        if self.status != NodeStatus::Recovering {
            return;
        }
        if self.oneighbors.contains_key(&src) {
            tracing::info!(addr = self.addr, via = src, "recovered as cluster member");
            self.next_hop = Some(src);
            self.hops_to_sink = None;
            self.state = NodeState::ClusterMember;
        }
        if self.state == NodeState::ClusterHead {
            let adopt = match (self.hops_to_sink, node_hops) {
                (None, _) => true,
                (Some(mine), Some(theirs)) => mine >= theirs,
                (Some(_), None) => false,
            };
            if adopt {
                self.next_hop = Some(src);
                self.hops_to_sink = node_hops.map(|h| h + 1);
            }
        }
    }

    fn handle_ack(&mut self, src: Addr) {
        if self.waiting_ack {
            self.outbox.pop_front();
            self.waiting_ack = false;
            self.msgs_lost_count = 0;
        } else {
            tracing::warn!(addr = self.addr, src, "unexpected ack");
        }
    }

    // ---- helpers ----

    /// Spend energy; the level never goes below zero.
    fn debit(&mut self, energy: f64) {
        self.energy = (self.energy - energy).max(0.0);
    }

    fn remove_member(&mut self, addr: Addr) {
        if let Some(index) = self.cmember_list.iter().position(|&a| a == addr) {
            self.cmember_list.remove(index);
        }
    }
}

/// `a < b` with `None` as the unknown/infinite hop count.
fn hops_lt(a: Option<u32>, b: Option<u32>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x < y,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
