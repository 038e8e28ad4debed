//! Inbound packet model and advert application-data codec
//!
//! Packets arrive already framed and decrypted by the external protocol
//! engine; this module only fixes the shape of what crosses that boundary.
//! Field sizes and payload-type bytes are engine-published constants and
//! are treated as opaque protocol facts here.

use crate::error::MeshError;

/// Size of a public key in an advert payload
pub const PUB_KEY_SIZE: usize = 32;
/// Size of the timestamp field in an advert payload
pub const TIMESTAMP_SIZE: usize = 4;
/// Size of the signature field in an advert payload
pub const SIGNATURE_SIZE: usize = 64;
/// Advert header length preceding the application data
pub const ADVERT_HEADER_LEN: usize = PUB_KEY_SIZE + TIMESTAMP_SIZE + SIGNATURE_SIZE;

/// Payload type byte: direct text message
pub const PAYLOAD_TYPE_TXT_MSG: u8 = 0x02;
/// Payload type byte: acknowledgement
pub const PAYLOAD_TYPE_ACK: u8 = 0x03;
/// Payload type byte: node advertisement
pub const PAYLOAD_TYPE_ADVERT: u8 = 0x04;
/// Payload type byte: group (channel) text message
pub const PAYLOAD_TYPE_GRP_TXT: u8 = 0x05;

/// Advert appdata flag: latitude/longitude fields present
const ADV_LATLON_MASK: u8 = 0x10;
/// Advert appdata flag: first feature field present
const ADV_FEAT1_MASK: u8 = 0x20;
/// Advert appdata flag: second feature field present
const ADV_FEAT2_MASK: u8 = 0x40;
/// Advert appdata flag: node name present
const ADV_NAME_MASK: u8 = 0x80;

/// Decrypted content of an inbound packet, classified at the boundary
///
/// A closed tagged union rather than open field access: the engine decides
/// what it decrypted, the translator only matches on it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Decrypted {
    /// Nothing was decrypted (adverts, acks, foreign traffic)
    #[default]
    None,
    /// Direct-message text
    Text {
        /// Message text
        text: String,
    },
    /// Channel-message fields
    GroupText(GroupTextData),
}

/// Decoded fields of a group text payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTextData {
    /// Channel name the message was encrypted for
    pub channel_name: String,
    /// Sender display name as embedded by the sender
    pub sender_name: String,
    /// Message text
    pub text: String,
    /// Sender-supplied Unix timestamp, if present
    pub timestamp: Option<i64>,
}

/// An inbound packet as delivered by the protocol engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    payload_type: u8,
    payload: Vec<u8>,
    /// Decrypted content, when the engine could decrypt the payload
    pub decrypted: Decrypted,
}

impl InboundPacket {
    /// Construct a packet with arbitrary decrypted content
    pub fn new(payload_type: u8, payload: Vec<u8>, decrypted: Decrypted) -> Self {
        Self {
            payload_type,
            payload,
            decrypted,
        }
    }

    /// A packet whose payload the engine did not decrypt
    pub fn opaque(payload_type: u8, payload: Vec<u8>) -> Self {
        Self::new(payload_type, payload, Decrypted::None)
    }

    /// An advert packet; the payload is key | timestamp | signature | appdata
    pub fn advert(payload: Vec<u8>) -> Self {
        Self::opaque(PAYLOAD_TYPE_ADVERT, payload)
    }

    /// A decrypted direct text message
    pub fn text_msg(payload: Vec<u8>, text: impl Into<String>) -> Self {
        Self::new(
            PAYLOAD_TYPE_TXT_MSG,
            payload,
            Decrypted::Text { text: text.into() },
        )
    }

    /// A decrypted group text message
    pub fn group_text(payload: Vec<u8>, data: GroupTextData) -> Self {
        Self::new(PAYLOAD_TYPE_GRP_TXT, payload, Decrypted::GroupText(data))
    }

    /// Payload type byte
    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// Raw payload bytes
    ///
    /// For direct messages the second byte is the sender's source hash.
    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload
    }
}

/// Decoded advert application data
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertAppData {
    /// Raw flags byte
    pub flags: u8,
    /// Announced position, when the latlon flag is set
    pub latlon: Option<(i32, i32)>,
    /// Announced node name, when the name flag is set
    pub name: Option<String>,
}

/// Decode the application data trailing an advert header
///
/// Layout: flags byte, then optional fixed-size fields gated by the flags,
/// then the node name as the UTF-8 remainder.
pub fn decode_appdata(data: &[u8]) -> Result<AdvertAppData, MeshError> {
    fn take<'a>(rest: &mut &'a [u8], n: usize) -> Result<&'a [u8], MeshError> {
        if rest.len() < n {
            return Err(MeshError::Decode("advert appdata truncated".to_string()));
        }
        let (head, tail) = rest.split_at(n);
        *rest = tail;
        Ok(head)
    }

    let (&flags, mut rest) = data
        .split_first()
        .ok_or_else(|| MeshError::Decode("empty advert appdata".to_string()))?;

    let latlon = if flags & ADV_LATLON_MASK != 0 {
        let lat = i32::from_le_bytes(take(&mut rest, 4)?.try_into().unwrap());
        let lon = i32::from_le_bytes(take(&mut rest, 4)?.try_into().unwrap());
        Some((lat, lon))
    } else {
        None
    };
    if flags & ADV_FEAT1_MASK != 0 {
        take(&mut rest, 2)?;
    }
    if flags & ADV_FEAT2_MASK != 0 {
        take(&mut rest, 2)?;
    }

    let name = if flags & ADV_NAME_MASK != 0 {
        let text = std::str::from_utf8(rest)
            .map_err(|_| MeshError::Decode("advert name is not UTF-8".to_string()))?;
        let trimmed = text.trim_end_matches('\0');
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    } else {
        None
    };

    Ok(AdvertAppData { flags, latlon, name })
}

/// Encode advert application data carrying just a node name
///
/// Used by the simulated paths and tests to craft well-formed adverts.
pub fn encode_appdata_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + name.len());
    out.push(ADV_NAME_MASK);
    out.extend_from_slice(name.as_bytes());
    out
}
