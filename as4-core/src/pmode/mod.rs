//! Processing Modes
//!
//! A PMode is the agreed configuration of one bilateral messaging
//! relationship: who initiates, who responds, the message exchange
//! pattern, and per leg the transport, business, security and error
//! handling parameters.
//!
//! PModes are plain values. Once handed to the [`PModeRegistry`] they are
//! shared as `Arc<PMode>` snapshots and only replaced as a whole.

pub mod leg;
pub mod registry;
pub mod security;
pub mod structure;

pub use leg::{
    BusinessInfo, ErrorHandling, Leg, LegProtocol, PModeProperty, PayloadProfile, Reliability,
};
pub use registry::{PModeRegistry, RegistryError, RegistryResult};
pub use security::{
    DigestAlgorithm, EncryptionAlgorithm, LegSecurity, ReplyPattern, SignatureAlgorithm,
    WssVersion,
};
pub use structure::{validate_structure, StructuralError};

use crate::ebms::PartyId;
use crate::storage::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message exchange pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mep {
    OneWay,
    TwoWay,
}

impl Mep {
    pub fn uri(&self) -> &'static str {
        match self {
            Mep::OneWay => "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/oneWay",
            Mep::TwoWay => "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/twoWay",
        }
    }
}

impl fmt::Display for Mep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mep::OneWay => "one-way",
            Mep::TwoWay => "two-way",
        })
    }
}

/// Transport binding of a MEP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MepBinding {
    Push,
    Pull,
    Sync,
    PushPush,
    PushPull,
    PullPush,
}

impl MepBinding {
    pub fn uri(&self) -> &'static str {
        match self {
            MepBinding::Push => "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/push",
            MepBinding::Pull => "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/pull",
            MepBinding::Sync => "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/sync",
            MepBinding::PushPush => "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/push-and-push",
            MepBinding::PushPull => "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/push-and-pull",
            MepBinding::PullPush => "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/pull-and-push",
        }
    }

    /// Number of legs the binding defines
    pub fn leg_count(&self) -> usize {
        match self {
            MepBinding::Push | MepBinding::Pull => 1,
            MepBinding::Sync | MepBinding::PushPush | MepBinding::PushPull | MepBinding::PullPush => 2,
        }
    }

    /// A leg of the binding is pulled by the responder
    pub fn is_pull(&self) -> bool {
        matches!(self, MepBinding::Pull | MepBinding::PushPull | MepBinding::PullPush)
    }
}

impl fmt::Display for MepBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MepBinding::Push => "push",
            MepBinding::Pull => "pull",
            MepBinding::Sync => "sync",
            MepBinding::PushPush => "push-and-push",
            MepBinding::PushPull => "push-and-pull",
            MepBinding::PullPush => "pull-and-push",
        })
    }
}

/// Username token credentials of a party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyCredentials {
    pub username: String,
    pub password: String,
}

/// PMode.Initiator / PMode.Responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
    pub id_value: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<PartyCredentials>,
}

impl Party {
    pub fn new(id_type: Option<&str>, id_value: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id_type: id_type.map(str::to_string),
            id_value: id_value.into(),
            role: role.into(),
            credentials: None,
        }
    }

    /// Whether a wire party id denotes this party
    ///
    /// Values must be equal; types are compared only when both sides carry one.
    pub fn matches(&self, party_id: &PartyId) -> bool {
        if self.id_value != party_id.value {
            return false;
        }
        match (&self.id_type, &party_id.id_type) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    pub fn to_party_id(&self) -> PartyId {
        PartyId {
            id_type: self.id_type.clone(),
            value: self.id_value.clone(),
        }
    }
}

/// AS4 payload compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    Gzip,
    Deflate,
}

impl CompressionMode {
    pub fn mime_type(&self) -> &'static str {
        match self {
            CompressionMode::Gzip => "application/gzip",
            CompressionMode::Deflate => "application/deflate",
        }
    }
}

/// PMode.PayloadService
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_mode: Option<CompressionMode>,
}

/// PMode.ReceptionAwareness
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionAwareness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_detection: Option<bool>,
}

/// A processing mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PMode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<Party>,
    pub mep: Mep,
    pub mep_binding: MepBinding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg1: Option<Leg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg2: Option<Leg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_service: Option<PayloadService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reception_awareness: Option<ReceptionAwareness>,
}

impl PMode {
    /// One-way/push PMode with a single leg
    pub fn one_way_push(
        id: impl Into<String>,
        initiator: Party,
        responder: Party,
        leg1: Leg,
    ) -> Self {
        Self {
            id: id.into(),
            agreement_ref: None,
            initiator: Some(initiator),
            responder: Some(responder),
            mep: Mep::OneWay,
            mep_binding: MepBinding::Push,
            leg1: Some(leg1),
            leg2: None,
            payload_service: None,
            reception_awareness: None,
        }
    }

    pub fn with_leg2(mut self, leg2: Leg) -> Self {
        self.leg2 = Some(leg2);
        self
    }

    pub fn with_mep(mut self, mep: Mep, mep_binding: MepBinding) -> Self {
        self.mep = mep;
        self.mep_binding = mep_binding;
        self
    }

    pub fn with_payload_service(mut self, payload_service: PayloadService) -> Self {
        self.payload_service = Some(payload_service);
        self
    }

    /// Leg governing a message: leg2 for replies within a two-way MEP
    pub fn effective_leg(&self, is_reply: bool) -> Option<&Leg> {
        if is_reply && self.mep == Mep::TwoWay {
            self.leg2.as_ref().or(self.leg1.as_ref())
        } else {
            self.leg1.as_ref()
        }
    }

    pub fn compression_mode(&self) -> Option<CompressionMode> {
        self.payload_service.as_ref().and_then(|p| p.compression_mode)
    }

    /// Duplicate detection is on unless explicitly disabled
    pub fn is_duplicate_detection_enabled(&self) -> bool {
        self.reception_awareness
            .as_ref()
            .and_then(|r| r.duplicate_detection)
            .unwrap_or(true)
    }
}

impl Record for PMode {
    fn record_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::SoapVersion;

    fn leg(address: &str) -> Leg {
        Leg::new(LegProtocol::new(Some(address), SoapVersion::Soap12))
    }

    #[test]
    fn test_party_matching() {
        let party = Party::new(Some("urn:oasis:names:tc:ebcore:partyid-type:iso6523:0088"), "123", "role");

        assert!(party.matches(&PartyId::new(None, "123")));
        assert!(party.matches(&PartyId::new(
            Some("urn:oasis:names:tc:ebcore:partyid-type:iso6523:0088"),
            "123"
        )));
        assert!(!party.matches(&PartyId::new(Some("urn:other"), "123")));
        assert!(!party.matches(&PartyId::new(None, "456")));
    }

    #[test]
    fn test_effective_leg() {
        let pmode = PMode::one_way_push(
            "pm",
            Party::new(None, "a", "r"),
            Party::new(None, "b", "r"),
            leg("https://one"),
        );
        assert_eq!(
            pmode.effective_leg(true).unwrap().protocol.address.as_deref(),
            Some("https://one")
        );

        let two_way = pmode
            .with_mep(Mep::TwoWay, MepBinding::PushPush)
            .with_leg2(leg("https://two"));
        assert_eq!(
            two_way.effective_leg(true).unwrap().protocol.address.as_deref(),
            Some("https://two")
        );
        assert_eq!(
            two_way.effective_leg(false).unwrap().protocol.address.as_deref(),
            Some("https://one")
        );
    }

    #[test]
    fn test_duplicate_detection_default() {
        let mut pmode = PMode::one_way_push(
            "pm",
            Party::new(None, "a", "r"),
            Party::new(None, "b", "r"),
            Leg::default(),
        );
        assert!(pmode.is_duplicate_detection_enabled());

        pmode.reception_awareness = Some(ReceptionAwareness {
            duplicate_detection: Some(false),
            ..Default::default()
        });
        assert!(!pmode.is_duplicate_detection_enabled());
    }

    #[test]
    fn test_json_round_trip() {
        let pmode = PMode::one_way_push(
            "pm-json",
            Party::new(None, "a", "r"),
            Party::new(None, "b", "r"),
            leg("https://one").with_security(LegSecurity {
                wss_version: Some(WssVersion::Wss111),
                x509_signature_algorithm: Some(SignatureAlgorithm::RsaSha256),
                ..Default::default()
            }),
        );

        let json = serde_json::to_string(&pmode).unwrap();
        assert!(json.contains("\"mep_binding\":\"push\""));
        assert!(json.contains("\"rsa_sha256\""));

        let back: PMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pmode);
    }

    #[test]
    fn test_binding_leg_count() {
        assert_eq!(MepBinding::Push.leg_count(), 1);
        assert_eq!(MepBinding::Pull.leg_count(), 1);
        assert_eq!(MepBinding::PushPush.leg_count(), 2);
        assert_eq!(MepBinding::Sync.leg_count(), 2);
    }
}
