//! AS4 interoperability profiles
//!
//! A profile fixes the algorithms, SOAP version, topology and error
//! handling an e-delivery network expects. Each profile contributes a
//! validator used by the inbound pipeline and a PMode template factory.

mod rules;
mod standard;

pub use rules::{ProfileRules, RuleValidator};
pub use standard::{CEF, ENTSOG, ESENS, PEPPOL, PEPPOL_PARTY_ID_TYPE, STANDARD_PROFILES};

use crate::ebms::{SignalMessage, UserMessage, INITIATOR_ROLE, RESPONDER_ROLE};
use crate::issues::ErrorList;
use crate::pmode::{
    BusinessInfo, DigestAlgorithm, EncryptionAlgorithm, ErrorHandling, Leg, LegProtocol,
    LegSecurity, PMode, Party, PayloadService, ReceptionAwareness, ReplyPattern,
    SignatureAlgorithm, WssVersion,
};
use crate::traits::CertificateInfo;
use crate::soap::SoapVersion;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What kind of message a PMode is validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Full check, including the partner endpoint address
    UserMessage,
    /// PMode used only to answer or pull; the address is not checked
    SignalMessage,
}

impl ValidationMode {
    /// Mode a PMode is registered under: pull-bound PModes serve pull requests
    pub fn for_pmode(pmode: &PMode) -> Self {
        if pmode.mep_binding.is_pull() {
            ValidationMode::SignalMessage
        } else {
            ValidationMode::UserMessage
        }
    }
}

/// Profile-specific compatibility rules
///
/// Implementations only append to the caller's [`ErrorList`]; every check
/// runs even after a failure has been recorded.
pub trait ProfileValidator: Send + Sync {
    fn profile_id(&self) -> &str;

    fn soap_version(&self) -> SoapVersion;

    fn accepted_signature_algorithms(&self) -> &[SignatureAlgorithm];

    fn accepted_digest_algorithms(&self) -> &[DigestAlgorithm];

    fn accepted_encryption_algorithms(&self) -> &[EncryptionAlgorithm];

    fn accepted_wss_versions(&self) -> &[WssVersion];

    fn validate_pmode(&self, pmode: &PMode, mode: ValidationMode, errors: &mut ErrorList);

    fn validate_user_message(&self, user_message: &UserMessage, errors: &mut ErrorList);

    fn validate_signal_message(&self, signal: &SignalMessage, errors: &mut ErrorList);

    /// Check that the sender identity is backed by the certificates seen
    fn validate_initiator_identity(
        &self,
        user_message: &UserMessage,
        signing_certificate: Option<&CertificateInfo>,
        tls_client_certificate: Option<&CertificateInfo>,
        errors: &mut ErrorList,
    );
}

/// A named profile: its rules, its validator and its PMode template
#[derive(Clone)]
pub struct As4Profile {
    rules: &'static ProfileRules,
    validator: Arc<dyn ProfileValidator>,
}

impl As4Profile {
    pub fn new(rules: &'static ProfileRules, debug_mode: bool) -> Self {
        Self {
            rules,
            validator: Arc::new(RuleValidator::new(rules, debug_mode)),
        }
    }

    /// Profile with a custom validator
    pub fn with_validator(rules: &'static ProfileRules, validator: Arc<dyn ProfileValidator>) -> Self {
        Self { rules, validator }
    }

    pub fn id(&self) -> &'static str {
        self.rules.id
    }

    pub fn display_name(&self) -> &'static str {
        self.rules.display_name
    }

    pub fn rules(&self) -> &'static ProfileRules {
        self.rules
    }

    pub fn validator(&self) -> Arc<dyn ProfileValidator> {
        Arc::clone(&self.validator)
    }

    /// PMode that satisfies this profile for the given pair of parties
    ///
    /// The id is `<initiator>-<responder>`.
    pub fn create_pmode_template(
        &self,
        initiator_id: &str,
        responder_id: &str,
        address: Option<&str>,
    ) -> PMode {
        let rules = self.rules;

        let security = LegSecurity {
            wss_version: Some(rules.wss_version),
            x509_sign_certificate: None,
            x509_signature_algorithm: Some(rules.signature_algorithm),
            x509_signature_digest_algorithm: Some(rules.digest_algorithm),
            x509_encryption_certificate: None,
            x509_encryption_algorithm: Some(rules.encryption_algorithm),
            x509_encryption_minimum_strength: Some(rules.encryption_algorithm.key_strength()),
            pmode_authorize: Some(false),
            send_receipt: Some(true),
            send_receipt_non_repudiation: Some(true),
            send_receipt_reply_pattern: Some(ReplyPattern::Response),
        };

        let leg = Leg::new(LegProtocol::new(address, rules.soap_version))
            .with_business_info(BusinessInfo::default())
            .with_error_handling(ErrorHandling::report_everything())
            .with_security(security);

        let mut pmode = PMode::one_way_push(
            format!("{}-{}", initiator_id, responder_id),
            Party::new(rules.party_id_type, initiator_id, INITIATOR_ROLE),
            Party::new(rules.party_id_type, responder_id, RESPONDER_ROLE),
            leg,
        );
        pmode.payload_service = rules.template_compression.map(|mode| PayloadService {
            compression_mode: Some(mode),
        });
        pmode.reception_awareness = Some(ReceptionAwareness {
            enabled: Some(true),
            retry: Some(true),
            max_retries: Some(1),
            retry_interval_ms: Some(10_000),
            duplicate_detection: Some(true),
        });
        pmode
    }
}

impl std::fmt::Debug for As4Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("As4Profile").field("id", &self.rules.id).finish()
    }
}

/// The profiles known to an agent, keyed by id
///
/// Built once at startup and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<&'static str, As4Profile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every shipped profile
    pub fn standard(debug_mode: bool) -> Self {
        STANDARD_PROFILES
            .iter()
            .fold(Self::new(), |registry, rules| {
                registry.with_profile(As4Profile::new(*rules, debug_mode))
            })
    }

    /// Add or replace a profile
    pub fn with_profile(mut self, profile: As4Profile) -> Self {
        self.profiles.insert(profile.id(), profile);
        self
    }

    pub fn get(&self, id: &str) -> Option<&As4Profile> {
        self.profiles.get(id)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.profiles.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &As4Profile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
