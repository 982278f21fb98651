//! Subset of the mesh node's protobuf API used by the bridge.
//!
//! Field numbers match the node firmware's `mesh.proto` and `portnums.proto`.
//! Only the messages needed to send channel text, request the node
//! configuration and keep the link alive are declared; unknown fields in
//! received messages are skipped by the decoder.

/// Destination address for channel broadcasts
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// Largest application payload carried in one packet
pub const MAX_TEXT_PAYLOAD: usize = 233;

/// Client to node envelope
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToRadio {
    #[prost(oneof = "to_radio::PayloadVariant", tags = "1, 3, 4, 7")]
    pub payload_variant: Option<to_radio::PayloadVariant>,
}

pub mod to_radio {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "1")]
        Packet(super::MeshPacket),
        /// Asks the node to stream its configuration, echoed back in `config_complete_id`
        #[prost(uint32, tag = "3")]
        WantConfigId(u32),
        #[prost(bool, tag = "4")]
        Disconnect(bool),
        #[prost(message, tag = "7")]
        Heartbeat(super::Heartbeat),
    }
}

/// Node to client envelope
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromRadio {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(oneof = "from_radio::PayloadVariant", tags = "2, 7, 8")]
    pub payload_variant: Option<from_radio::PayloadVariant>,
}

pub mod from_radio {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "2")]
        Packet(super::MeshPacket),
        #[prost(uint32, tag = "7")]
        ConfigCompleteId(u32),
        #[prost(bool, tag = "8")]
        Rebooted(bool),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MeshPacket {
    #[prost(fixed32, tag = "1")]
    pub from: u32,
    #[prost(fixed32, tag = "2")]
    pub to: u32,
    /// Channel index on the sending node
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    #[prost(fixed32, tag = "6")]
    pub id: u32,
    #[prost(uint32, tag = "9")]
    pub hop_limit: u32,
    #[prost(bool, tag = "10")]
    pub want_ack: bool,
    #[prost(oneof = "mesh_packet::PayloadVariant", tags = "4, 5")]
    pub payload_variant: Option<mesh_packet::PayloadVariant>,
}

pub mod mesh_packet {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "4")]
        Decoded(super::Data),
        #[prost(bytes = "vec", tag = "5")]
        Encrypted(Vec<u8>),
    }
}

/// Decoded application payload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Data {
    #[prost(enumeration = "PortNum", tag = "1")]
    pub portnum: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub want_response: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Heartbeat {
    #[prost(uint32, tag = "1")]
    pub nonce: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PortNum {
    UnknownApp = 0,
    TextMessageApp = 1,
    PositionApp = 3,
    NodeinfoApp = 4,
    RoutingApp = 5,
    TelemetryApp = 67,
}

impl ToRadio {
    /// Broadcast text on a channel. The text is cut to [`MAX_TEXT_PAYLOAD`] bytes
    /// on a character boundary.
    pub fn channel_text(channel: u32, text: &str, hop_limit: u32, id: u32) -> Self {
        let payload = truncate_utf8(text, MAX_TEXT_PAYLOAD).as_bytes().to_vec();
        Self {
            payload_variant: Some(to_radio::PayloadVariant::Packet(MeshPacket {
                from: 0,
                to: BROADCAST_ADDR,
                channel,
                id,
                hop_limit,
                want_ack: false,
                payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                    portnum: PortNum::TextMessageApp as i32,
                    payload,
                    want_response: false,
                })),
            })),
        }
    }

    pub fn want_config(nonce: u32) -> Self {
        Self {
            payload_variant: Some(to_radio::PayloadVariant::WantConfigId(nonce)),
        }
    }

    pub fn heartbeat(nonce: u32) -> Self {
        Self {
            payload_variant: Some(to_radio::PayloadVariant::Heartbeat(Heartbeat { nonce })),
        }
    }

    pub fn disconnect() -> Self {
        Self {
            payload_variant: Some(to_radio::PayloadVariant::Disconnect(true)),
        }
    }
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a character.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
