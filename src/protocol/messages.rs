//! Wire format and factories for UOAR protocol messages.
//!
//! A message is a fixed header (source, destination, flags, creation time,
//! time-to-live) plus a payload typed by kind. The flags byte carries the
//! kind in its low nibble and the transport/acknowledgment bits in the
//! high nibble. Payloads are one discriminated variant per kind, so
//! receivers destructure instead of indexing into an untyped sequence.
//!
//! Nothing here has behavior beyond field composition; the node engine
//! and the harness are the only consumers.

use crate::geometry::Position;
use crate::protocol::node::NodeState;

/// Node address on the wire.
pub type Addr = u32;

/// Destination address reserved for broadcasts; never names a real node.
pub const BROADCAST_ADDR: Addr = 0;
/// Default time-to-live for new messages, in hops.
pub const BASIC_TTL: u32 = 100;
/// Header overhead, in length-units: 4 per address, 1 for the flags,
/// 1 for the ttl (creation time is diagnostics only and rides free).
pub const HEADER_SIZE: usize = 10;

/// Transport bit in the flags byte: set = acoustic, clear = optical.
pub const FLAG_ACOUSTIC: u8 = 0x10;
/// Acknowledgment bit in the flags byte.
pub const FLAG_WITH_ACK: u8 = 0x20;

/// Message kinds, carried in the low nibble of the flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    CommonData = 0x00,
    Ack = 0x01,
    InfoAnnoun = 0x02,
    ScoreAnnoun = 0x03,
    ClusterAnnoun = 0x04,
    RouteAnnoun = 0x05,
    ReqScore = 0x06,
    RepScore = 0x07,
    UpdateInfo = 0x08,
    ReqRinfo = 0x09,
    RepRinfo = 0x0a,
}

impl MessageKind {
    /// Decode a kind from the low nibble of a flags byte.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble & 0x0f {
            0x00 => Some(Self::CommonData),
            0x01 => Some(Self::Ack),
            0x02 => Some(Self::InfoAnnoun),
            0x03 => Some(Self::ScoreAnnoun),
            0x04 => Some(Self::ClusterAnnoun),
            0x05 => Some(Self::RouteAnnoun),
            0x06 => Some(Self::ReqScore),
            0x07 => Some(Self::RepScore),
            0x08 => Some(Self::UpdateInfo),
            0x09 => Some(Self::ReqRinfo),
            0x0a => Some(Self::RepRinfo),
            _ => None,
        }
    }

    /// Kind name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CommonData => "CommonData",
            Self::Ack => "Ack",
            Self::InfoAnnoun => "InfoAnnoun",
            Self::ScoreAnnoun => "ScoreAnnoun",
            Self::ClusterAnnoun => "ClusterAnnoun",
            Self::RouteAnnoun => "RouteAnnoun",
            Self::ReqScore => "ReqScore",
            Self::RepScore => "RepScore",
            Self::UpdateInfo => "UpdateInfo",
            Self::ReqRinfo => "ReqRinfo",
            Self::RepRinfo => "RepRinfo",
        }
    }
}

/// Body of a data message: either the application chunk itself or a
/// nested message being relayed toward the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum DataBody {
    Chunk(Vec<u8>),
    Nested(Box<Message>),
}

/// Typed payload, one variant per message kind.
///
/// Hop counts and next hops use `None` where the sender has no route
/// (the unknown/infinite sentinel).
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// ACK and score-request messages carry nothing.
    Empty,
    /// Application data or a relayed message.
    Data(DataBody),
    /// Info announcement: where the sender is and how it is routed.
    Info {
        position: Position,
        state: NodeState,
        hops_to_sink: Option<u32>,
    },
    /// Score announcement or score reply.
    Score(f64),
    /// Cluster announcement: the sender's role after election.
    Cluster { is_head: bool, position: Position },
    /// Route announcement: the sender's route toward the sink.
    Route {
        is_head: bool,
        next_hop: Option<Addr>,
        hops_to_sink: Option<u32>,
        position: Position,
    },
    /// Headship handoff: `new_head` takes over, routing via `next_hop`.
    Update {
        new_head: Addr,
        next_hop: Option<Addr>,
    },
    /// Recovery: request routes that avoid `dead_node`.
    RouteRequest { dead_node: Addr },
    /// Recovery: the replier's own route.
    RouteReply {
        next_hop: Option<Addr>,
        hops_to_sink: Option<u32>,
    },
}

impl Payload {
    /// Encoded payload size, in length-units.
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Data(DataBody::Chunk(chunk)) => chunk.len(),
            Self::Data(DataBody::Nested(inner)) => inner.encoded_len(),
            Self::Info { .. } => 3,
            Self::Score(_) => 1,
            Self::Cluster { .. } => 2,
            Self::Route { .. } => 4,
            Self::Update { .. } => 2,
            Self::RouteRequest { .. } => 1,
            Self::RouteReply { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub src: Addr,
    pub dst: Addr,
    /// Kind in the low nibble, transport and ACK bits in the high nibble.
    pub flags: u8,
    pub payload: Payload,
    /// Creation time, in seconds. Diagnostics only.
    pub ctime: f64,
    /// Remaining hop budget.
    pub ttl: u32,
}

impl Message {
    pub fn new(src: Addr, dst: Addr, flags: u8, payload: Payload, ctime: f64, ttl: u32) -> Self {
        Self {
            src,
            dst,
            flags,
            payload,
            ctime,
            ttl,
        }
    }

    /// Encoded length, in length-units: header plus payload elements.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Message kind from the flags byte; `None` for a corrupt nibble.
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_nibble(self.flags)
    }

    pub fn is_acoustic(&self) -> bool {
        self.flags & FLAG_ACOUSTIC != 0
    }

    pub fn with_ack(&self) -> bool {
        self.flags & FLAG_WITH_ACK != 0
    }

    /// Switch the transport bit; used when a queued message is refreshed
    /// to the sender's current role just before transmission.
    pub fn set_transport(&mut self, acoustic: bool) {
        if acoustic {
            self.flags |= FLAG_ACOUSTIC;
        } else {
            self.flags &= !FLAG_ACOUSTIC;
        }
    }

    /// Kind name for logging; "Unknown" for a corrupt nibble.
    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("Unknown", |k| k.type_name())
    }

    // ---- factories ----

    /// Data message over the acoustic link, acknowledged.
    pub fn acoustic_data(src: Addr, dst: Addr, body: DataBody, ctime: f64) -> Self {
        let flags = FLAG_ACOUSTIC | FLAG_WITH_ACK | MessageKind::CommonData as u8;
        Self::new(src, dst, flags, Payload::Data(body), ctime, BASIC_TTL)
    }

    /// Data message over the optical link, acknowledged.
    pub fn optical_data(src: Addr, dst: Addr, body: DataBody, ctime: f64) -> Self {
        let flags = FLAG_WITH_ACK | MessageKind::CommonData as u8;
        Self::new(src, dst, flags, Payload::Data(body), ctime, BASIC_TTL)
    }

    /// Plain acoustic acknowledgment.
    pub fn acoustic_ack(src: Addr, dst: Addr) -> Self {
        let flags = FLAG_ACOUSTIC | MessageKind::Ack as u8;
        Self::new(src, dst, flags, Payload::Empty, 0.0, BASIC_TTL)
    }

    /// Plain optical acknowledgment.
    pub fn optical_ack(src: Addr, dst: Addr) -> Self {
        let flags = MessageKind::Ack as u8;
        Self::new(src, dst, flags, Payload::Empty, 0.0, BASIC_TTL)
    }

    /// Broadcast info announcement: position, role and route quality.
    pub fn info_announcement(
        src: Addr,
        position: Position,
        state: NodeState,
        hops_to_sink: Option<u32>,
    ) -> Self {
        let flags = FLAG_ACOUSTIC | MessageKind::InfoAnnoun as u8;
        let payload = Payload::Info {
            position,
            state,
            hops_to_sink,
        };
        Self::new(src, BROADCAST_ADDR, flags, payload, 0.0, BASIC_TTL)
    }

    /// Broadcast score announcement for the election phase.
    pub fn score_announcement(src: Addr, score: f64) -> Self {
        let flags = FLAG_ACOUSTIC | MessageKind::ScoreAnnoun as u8;
        Self::new(src, BROADCAST_ADDR, flags, Payload::Score(score), 0.0, BASIC_TTL)
    }

    /// Broadcast cluster announcement after role finalization.
    pub fn cluster_announcement(src: Addr, is_head: bool, position: Position) -> Self {
        let flags = FLAG_ACOUSTIC | MessageKind::ClusterAnnoun as u8;
        let payload = Payload::Cluster { is_head, position };
        Self::new(src, BROADCAST_ADDR, flags, payload, 0.0, BASIC_TTL)
    }

    /// Broadcast route announcement used to build the head backbone.
    pub fn route_announcement(
        src: Addr,
        is_head: bool,
        next_hop: Option<Addr>,
        hops_to_sink: Option<u32>,
        position: Position,
    ) -> Self {
        let flags = FLAG_ACOUSTIC | MessageKind::RouteAnnoun as u8;
        let payload = Payload::Route {
            is_head,
            next_hop,
            hops_to_sink,
            position,
        };
        Self::new(src, BROADCAST_ADDR, flags, payload, 0.0, BASIC_TTL)
    }

    /// Broadcast request for neighbor scores (headship update).
    pub fn score_request(src: Addr) -> Self {
        let flags = FLAG_ACOUSTIC | MessageKind::ReqScore as u8;
        Self::new(src, BROADCAST_ADDR, flags, Payload::Empty, 0.0, BASIC_TTL)
    }

    /// Unicast score reply, optical and acknowledged.
    pub fn score_reply(src: Addr, dst: Addr, score: f64) -> Self {
        let flags = FLAG_WITH_ACK | MessageKind::RepScore as u8;
        Self::new(src, dst, flags, Payload::Score(score), 0.0, BASIC_TTL)
    }

    /// Broadcast headship handoff notification.
    pub fn update_info(src: Addr, new_head: Addr, next_hop: Option<Addr>) -> Self {
        let flags = FLAG_ACOUSTIC | MessageKind::UpdateInfo as u8;
        let payload = Payload::Update { new_head, next_hop };
        Self::new(src, BROADCAST_ADDR, flags, payload, 0.0, BASIC_TTL)
    }

    /// Broadcast request for routes avoiding a dead node.
    pub fn route_info_request(src: Addr, dead_node: Addr) -> Self {
        let flags = FLAG_ACOUSTIC | MessageKind::ReqRinfo as u8;
        let payload = Payload::RouteRequest { dead_node };
        Self::new(src, BROADCAST_ADDR, flags, payload, 0.0, BASIC_TTL)
    }

    /// Unicast route-info reply over the acoustic link.
    pub fn acoustic_route_info_reply(
        src: Addr,
        dst: Addr,
        next_hop: Option<Addr>,
        hops_to_sink: Option<u32>,
    ) -> Self {
        let flags = FLAG_ACOUSTIC | FLAG_WITH_ACK | MessageKind::RepRinfo as u8;
        let payload = Payload::RouteReply {
            next_hop,
            hops_to_sink,
        };
        Self::new(src, dst, flags, payload, 0.0, BASIC_TTL)
    }

    /// Unicast route-info reply over the optical link.
    pub fn optical_route_info_reply(
        src: Addr,
        dst: Addr,
        next_hop: Option<Addr>,
        hops_to_sink: Option<u32>,
    ) -> Self {
        let flags = FLAG_WITH_ACK | MessageKind::RepRinfo as u8;
        let payload = Payload::RouteReply {
            next_hop,
            hops_to_sink,
        };
        Self::new(src, dst, flags, payload, 0.0, BASIC_TTL)
    }
}
