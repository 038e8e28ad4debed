//! Packet-to-event translation and sender resolution
//!
//! Packets arrive already decrypted by the protocol engine; this component
//! only classifies and attributes them. Malformed or foreign traffic is
//! expected background noise on a shared radio channel and is dropped
//! without surfacing an error.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::directory::ContactDirectory;
use crate::events::InboundEvent;
use crate::packet::{
    decode_appdata, Decrypted, InboundPacket, ADVERT_HEADER_LEN, PAYLOAD_TYPE_ADVERT,
    PAYLOAD_TYPE_GRP_TXT, PAYLOAD_TYPE_TXT_MSG, PUB_KEY_SIZE,
};

/// Classifies inbound packets and produces normalized application events
pub struct PacketTranslator {
    directory: Arc<ContactDirectory>,
}

impl PacketTranslator {
    /// Create a translator resolving senders against the given directory
    pub fn new(directory: Arc<ContactDirectory>) -> Self {
        Self { directory }
    }

    /// Translate one packet into an application event
    ///
    /// Returns `None` for ignored payload types and for adverts that fail
    /// to decode. Advert translation also upserts the announced contact
    /// into the directory (auto-discovery).
    pub fn translate(&self, packet: &InboundPacket) -> Option<InboundEvent> {
        match packet.payload_type() {
            PAYLOAD_TYPE_ADVERT => self.translate_advert(packet),
            PAYLOAD_TYPE_GRP_TXT => self.translate_group_text(packet),
            PAYLOAD_TYPE_TXT_MSG => self.translate_text(packet),
            other => {
                debug!(payload_type = other, "Ignoring packet");
                None
            }
        }
    }

    /// Channel messages carry everything in the decrypted payload
    fn translate_group_text(&self, packet: &InboundPacket) -> Option<InboundEvent> {
        let Decrypted::GroupText(data) = &packet.decrypted else {
            return None;
        };
        Some(InboundEvent::ChannelMessage {
            channel: data.channel_name.clone(),
            sender_name: data.sender_name.clone(),
            text: data.text.clone(),
            timestamp: data.timestamp,
        })
    }

    /// Direct messages carry only text; the sender is resolved from the
    /// packet's source hash
    fn translate_text(&self, packet: &InboundPacket) -> Option<InboundEvent> {
        let Decrypted::Text { text } = &packet.decrypted else {
            return None;
        };
        if text.is_empty() {
            return None;
        }
        let (sender_name, sender_key) = self.resolve_sender(packet);
        Some(InboundEvent::DirectMessage {
            sender_name,
            sender_key,
            text: text.clone(),
        })
    }

    /// Look up the sender's name and public key from the source hash
    ///
    /// The packet carries one byte of the sender's key (the second payload
    /// byte), so this match is a heuristic: the first directory entry with
    /// that first byte wins, and two contacts sharing a first byte are
    /// indistinguishable. An unmatched hash yields a placeholder name and
    /// an empty key.
    fn resolve_sender(&self, packet: &InboundPacket) -> (String, String) {
        let payload = packet.payload_bytes();
        if payload.len() < 2 {
            return ("?".to_string(), String::new());
        }
        let src_hash = payload[1];
        match self.directory.find_by_first_byte(src_hash) {
            Some(contact) => (contact.display_name(), contact.key_hex()),
            None => (format!("unknown-{:02X}", src_hash), String::new()),
        }
    }

    /// Process an advert: decode, auto-add the sender, emit discovery
    fn translate_advert(&self, packet: &InboundPacket) -> Option<InboundEvent> {
        let payload = packet.payload_bytes();
        if payload.len() < ADVERT_HEADER_LEN {
            debug!(len = payload.len(), "Advert payload too short, dropped");
            return None;
        }

        let public_key = &payload[..PUB_KEY_SIZE];
        let appdata = &payload[ADVERT_HEADER_LEN..];

        let decoded = match decode_appdata(appdata) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, "Failed to decode advert appdata, dropped");
                return None;
            }
        };
        let name = decoded.name?;

        if let Err(e) = self.directory.upsert(public_key, &name) {
            warn!(error = %e, "Failed to store discovered contact");
        } else {
            info!(%name, key = %hex::encode(&public_key[..8]), "Contact discovered via advert");
        }

        Some(InboundEvent::ContactDiscovered {
            public_key: hex::encode(public_key),
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{encode_appdata_name, GroupTextData, PAYLOAD_TYPE_ACK, SIGNATURE_SIZE, TIMESTAMP_SIZE};
    use crate::storage::Storage;
    use tempfile::TempDir;

    fn fixture() -> (PacketTranslator, Arc<ContactDirectory>, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp.path().join("test.redb")).unwrap());
        let directory = Arc::new(ContactDirectory::load(storage).unwrap());
        (PacketTranslator::new(directory.clone()), directory, temp)
    }

    fn advert_payload(public_key: &[u8; 32], name: &str) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(public_key);
        payload.extend_from_slice(&[0u8; TIMESTAMP_SIZE]);
        payload.extend_from_slice(&[0u8; SIGNATURE_SIZE]);
        payload.extend_from_slice(&encode_appdata_name(name));
        payload
    }

    #[test]
    fn test_group_text_becomes_channel_message() {
        let (translator, _dir, _temp) = fixture();

        let packet = InboundPacket::group_text(
            vec![0x00, 0x00],
            GroupTextData {
                channel_name: "Public".to_string(),
                sender_name: "alice".to_string(),
                text: "hello mesh".to_string(),
                timestamp: Some(1_700_000_000),
            },
        );

        let event = translator.translate(&packet).unwrap();
        assert_eq!(
            event,
            InboundEvent::ChannelMessage {
                channel: "Public".to_string(),
                sender_name: "alice".to_string(),
                text: "hello mesh".to_string(),
                timestamp: Some(1_700_000_000),
            }
        );
    }

    #[test]
    fn test_direct_message_resolves_known_sender() {
        let (translator, directory, _temp) = fixture();
        let mut key = vec![0xA3; 1];
        key.extend_from_slice(&[0x11; 31]);
        directory.upsert(&key, "bob").unwrap();

        let packet = InboundPacket::text_msg(vec![0x01, 0xA3], "ping");
        let event = translator.translate(&packet).unwrap();
        assert_eq!(
            event,
            InboundEvent::DirectMessage {
                sender_name: "bob".to_string(),
                sender_key: hex::encode(&key),
                text: "ping".to_string(),
            }
        );
    }

    #[test]
    fn test_direct_message_unknown_sender_placeholder() {
        let (translator, _dir, _temp) = fixture();

        let packet = InboundPacket::text_msg(vec![0x01, 0xA3], "who is this");
        let event = translator.translate(&packet).unwrap();
        assert_eq!(
            event,
            InboundEvent::DirectMessage {
                sender_name: "unknown-A3".to_string(),
                sender_key: String::new(),
                text: "who is this".to_string(),
            }
        );
    }

    #[test]
    fn test_direct_message_collision_first_wins() {
        let (translator, directory, _temp) = fixture();
        let mut early = vec![0xA3];
        early.extend_from_slice(&[0x01; 31]);
        let mut late = vec![0xA3];
        late.extend_from_slice(&[0x02; 31]);
        directory.upsert(&early, "early").unwrap();
        directory.upsert(&late, "late").unwrap();

        let packet = InboundPacket::text_msg(vec![0x01, 0xA3], "hi");
        let Some(InboundEvent::DirectMessage { sender_name, .. }) = translator.translate(&packet)
        else {
            panic!("expected a direct message");
        };
        assert_eq!(sender_name, "early");
    }

    #[test]
    fn test_advert_round_trip_discovers_contact() {
        let (translator, directory, _temp) = fixture();
        let key = [0x42u8; 32];

        let packet = InboundPacket::advert(advert_payload(&key, "Alice"));
        let event = translator.translate(&packet).unwrap();

        assert_eq!(
            event,
            InboundEvent::ContactDiscovered {
                public_key: hex::encode(key),
                name: "Alice".to_string(),
            }
        );
        assert_eq!(directory.find_by_name("Alice").unwrap().public_key, key.to_vec());
    }

    #[test]
    fn test_advert_without_name_is_dropped() {
        let (translator, directory, _temp) = fixture();
        let key = [0x42u8; 32];

        let mut payload = Vec::new();
        payload.extend_from_slice(&key);
        payload.extend_from_slice(&[0u8; TIMESTAMP_SIZE + SIGNATURE_SIZE]);
        payload.push(0x00); // flags: nothing present

        assert!(translator.translate(&InboundPacket::advert(payload)).is_none());
        assert!(directory.is_empty());
    }

    #[test]
    fn test_short_advert_is_dropped() {
        let (translator, _dir, _temp) = fixture();
        let packet = InboundPacket::advert(vec![0x01; 16]);
        assert!(translator.translate(&packet).is_none());
    }

    #[test]
    fn test_malformed_appdata_is_dropped() {
        let (translator, _dir, _temp) = fixture();
        let mut payload = vec![0x42u8; ADVERT_HEADER_LEN];
        payload.extend_from_slice(&[0x80, 0xFF, 0xFE]); // name flag but invalid UTF-8
        assert!(translator.translate(&InboundPacket::advert(payload)).is_none());
    }

    #[test]
    fn test_other_payload_types_ignored() {
        let (translator, _dir, _temp) = fixture();
        let packet = InboundPacket::opaque(PAYLOAD_TYPE_ACK, vec![0x01, 0x02]);
        assert!(translator.translate(&packet).is_none());
    }

    #[test]
    fn test_empty_text_is_dropped() {
        let (translator, _dir, _temp) = fixture();
        let packet = InboundPacket::text_msg(vec![0x01, 0xA3], "");
        assert!(translator.translate(&packet).is_none());
    }
}
