//! Shipped profiles

use super::ProfileRules;
use crate::pmode::{
    CompressionMode, DigestAlgorithm, EncryptionAlgorithm, SignatureAlgorithm, WssVersion,
};
use crate::soap::SoapVersion;

/// PartyId type of Peppol access points
pub const PEPPOL_PARTY_ID_TYPE: &str = "urn:fdc:peppol.eu:2017:identifiers:ap";

const SIGNATURE: &[SignatureAlgorithm] = &[SignatureAlgorithm::RsaSha256];
const DIGEST: &[DigestAlgorithm] = &[DigestAlgorithm::Sha256];
const ENCRYPTION: &[EncryptionAlgorithm] = &[EncryptionAlgorithm::Aes128Gcm];
const WSS: &[WssVersion] = &[WssVersion::Wss111];

/// CEF eDelivery AS4
pub static CEF: ProfileRules = ProfileRules {
    id: "cef",
    display_name: "CEF eDelivery",
    soap_version: SoapVersion::Soap12,
    signature_algorithm: SignatureAlgorithm::RsaSha256,
    digest_algorithm: DigestAlgorithm::Sha256,
    encryption_algorithm: EncryptionAlgorithm::Aes128Gcm,
    wss_version: WssVersion::Wss111,
    accepted_signature_algorithms: SIGNATURE,
    accepted_digest_algorithms: DIGEST,
    accepted_encryption_algorithms: ENCRYPTION,
    accepted_wss_versions: WSS,
    four_corner: true,
    certificate_bound_identity: false,
    party_id_type: Some("urn:oasis:names:tc:ebcore:partyid-type:unregistered"),
    template_compression: Some(CompressionMode::Gzip),
};

/// e-SENS AS4
pub static ESENS: ProfileRules = ProfileRules {
    id: "esens",
    display_name: "e-SENS",
    soap_version: SoapVersion::Soap12,
    signature_algorithm: SignatureAlgorithm::RsaSha256,
    digest_algorithm: DigestAlgorithm::Sha256,
    encryption_algorithm: EncryptionAlgorithm::Aes128Gcm,
    wss_version: WssVersion::Wss111,
    accepted_signature_algorithms: SIGNATURE,
    accepted_digest_algorithms: DIGEST,
    accepted_encryption_algorithms: ENCRYPTION,
    accepted_wss_versions: WSS,
    four_corner: true,
    certificate_bound_identity: false,
    party_id_type: Some("urn:oasis:names:tc:ebcore:partyid-type:unregistered"),
    template_compression: Some(CompressionMode::Gzip),
};

/// Peppol AS4
pub static PEPPOL: ProfileRules = ProfileRules {
    id: "peppol",
    display_name: "Peppol",
    soap_version: SoapVersion::Soap12,
    signature_algorithm: SignatureAlgorithm::RsaSha256,
    digest_algorithm: DigestAlgorithm::Sha256,
    encryption_algorithm: EncryptionAlgorithm::Aes128Gcm,
    wss_version: WssVersion::Wss111,
    accepted_signature_algorithms: SIGNATURE,
    accepted_digest_algorithms: DIGEST,
    accepted_encryption_algorithms: ENCRYPTION,
    accepted_wss_versions: WSS,
    four_corner: true,
    certificate_bound_identity: true,
    party_id_type: Some(PEPPOL_PARTY_ID_TYPE),
    template_compression: None,
};

/// ENTSOG AS4
pub static ENTSOG: ProfileRules = ProfileRules {
    id: "entsog",
    display_name: "ENTSOG",
    soap_version: SoapVersion::Soap12,
    signature_algorithm: SignatureAlgorithm::RsaSha256,
    digest_algorithm: DigestAlgorithm::Sha256,
    encryption_algorithm: EncryptionAlgorithm::Aes128Gcm,
    wss_version: WssVersion::Wss111,
    accepted_signature_algorithms: SIGNATURE,
    accepted_digest_algorithms: DIGEST,
    accepted_encryption_algorithms: ENCRYPTION,
    accepted_wss_versions: WSS,
    four_corner: false,
    certificate_bound_identity: false,
    party_id_type: Some("http://www.entsoe.eu/eic-codes/eic-party-codes-list"),
    template_compression: Some(CompressionMode::Gzip),
};

pub static STANDARD_PROFILES: [&ProfileRules; 4] = [&CEF, &ESENS, &PEPPOL, &ENTSOG];

#[cfg(test)]
mod tests {
    use crate::ebms::{MessageInfo, PartyId, PartyInfo, PartyRef, Property, UserMessage};
    use crate::issues::ErrorList;
    use crate::pmode::{
        CompressionMode, EncryptionAlgorithm, ErrorHandling, Mep, MepBinding, PMode,
        PayloadService, SignatureAlgorithm, WssVersion,
    };
    use crate::profile::{As4Profile, ProfileRegistry, ValidationMode, PEPPOL};
    use crate::traits::CertificateInfo;

    fn validate(profile: &As4Profile, pmode: &PMode, mode: ValidationMode) -> ErrorList {
        let mut errors = ErrorList::new();
        profile.validator().validate_pmode(pmode, mode, &mut errors);
        errors
    }

    fn template(profile: &As4Profile) -> PMode {
        profile.create_pmode_template("sender", "receiver", Some("https://ap.example.org/as4"))
    }

    fn security_mut(pmode: &mut PMode) -> &mut crate::pmode::LegSecurity {
        pmode
            .leg1
            .as_mut()
            .and_then(|l| l.security.as_mut())
            .unwrap()
    }

    #[test]
    fn test_templates_pass_their_own_validator() {
        let registry = ProfileRegistry::standard(false);
        assert_eq!(registry.ids(), vec!["cef", "entsog", "esens", "peppol"]);

        for profile in registry.iter() {
            let pmode = template(profile);
            let errors = validate(profile, &pmode, ValidationMode::UserMessage);
            assert!(errors.is_empty(), "{}: {:?}", profile.id(), errors);
            assert!(crate::pmode::validate_structure(&pmode).is_empty());
            assert_eq!(pmode.id, "sender-receiver");
        }
    }

    #[test]
    fn test_wrong_signature_algorithm_names_expected_uri() {
        let profile = As4Profile::new(&PEPPOL, false);
        let mut pmode = template(&profile);
        security_mut(&mut pmode).x509_signature_algorithm = Some(SignatureAlgorithm::RsaSha512);

        let errors = validate(&profile, &pmode, ValidationMode::UserMessage);
        assert_eq!(errors.len(), 1);
        let issue = errors.iter().next().unwrap();
        assert!(issue.field.ends_with("X509SignatureAlgorithm"));
        assert!(issue
            .message
            .contains("http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"));
    }

    #[test]
    fn test_missing_security_values_are_failures() {
        let profile = As4Profile::new(&super::CEF, false);
        let mut pmode = template(&profile);
        {
            let security = security_mut(&mut pmode);
            security.x509_encryption_algorithm = None;
            security.pmode_authorize = Some(true);
            security.wss_version = Some(WssVersion::Wss10);
        }

        let errors = validate(&profile, &pmode, ValidationMode::UserMessage);
        assert_eq!(errors.failures().count(), 3);

        security_mut(&mut pmode).x509_encryption_algorithm = Some(EncryptionAlgorithm::Aes256Gcm);
        let errors = validate(&profile, &pmode, ValidationMode::UserMessage);
        assert!(errors
            .iter()
            .any(|i| i.message.contains("http://www.w3.org/2009/xmlenc11#aes128-gcm")));
    }

    #[test]
    fn test_address_protocol_rules() {
        let strict = As4Profile::new(&super::CEF, false);
        let debug = As4Profile::new(&super::CEF, true);
        let pmode = strict.create_pmode_template("a", "b", Some("http://localhost:8080/as4"));

        assert_eq!(validate(&strict, &pmode, ValidationMode::UserMessage).len(), 1);
        assert!(validate(&debug, &pmode, ValidationMode::UserMessage).is_empty());
        // Address is not relevant for signal-only PModes
        assert!(validate(&strict, &pmode, ValidationMode::SignalMessage).is_empty());

        let ftp = strict.create_pmode_template("a", "b", Some("ftp://host/as4"));
        assert!(validate(&debug, &ftp, ValidationMode::UserMessage).has_failures());

        let none = strict.create_pmode_template("a", "b", None);
        assert!(validate(&strict, &none, ValidationMode::UserMessage).is_empty());
    }

    #[test]
    fn test_error_handling_rules() {
        let profile = As4Profile::new(&super::ENTSOG, false);
        let mut pmode = template(&profile);

        pmode.leg1.as_mut().unwrap().error_handling = Some(ErrorHandling {
            report_as_response: Some(true),
            report_process_error_notify_consumer: Some(false),
            report_delivery_failures_notify_producer: Some(false),
            ..Default::default()
        });
        let errors = validate(&profile, &pmode, ValidationMode::UserMessage);
        assert!(!errors.has_failures());
        assert_eq!(errors.warnings().count(), 2);

        pmode.leg1.as_mut().unwrap().error_handling = None;
        let errors = validate(&profile, &pmode, ValidationMode::UserMessage);
        assert_eq!(errors.failures().count(), 1);
    }

    #[test]
    fn test_mep_and_compression_rules() {
        let profile = As4Profile::new(&super::ESENS, false);

        let pull = template(&profile).with_mep(Mep::OneWay, MepBinding::Pull);
        assert_eq!(validate(&profile, &pull, ValidationMode::UserMessage).len(), 1);
        assert!(validate(&profile, &pull, ValidationMode::SignalMessage).is_empty());
        assert_eq!(ValidationMode::for_pmode(&pull), ValidationMode::SignalMessage);

        for binding in [MepBinding::PushPull, MepBinding::PullPush] {
            let two_way = template(&profile).with_mep(Mep::TwoWay, binding);
            assert!(validate(&profile, &two_way, ValidationMode::SignalMessage).is_empty());
            assert!(validate(&profile, &two_way, ValidationMode::UserMessage).has_failures());
        }

        let mismatched = template(&profile).with_mep(Mep::OneWay, MepBinding::PushPull);
        assert_eq!(validate(&profile, &mismatched, ValidationMode::SignalMessage).len(), 1);
        let sync = template(&profile).with_mep(Mep::TwoWay, MepBinding::Sync);
        assert_eq!(validate(&profile, &sync, ValidationMode::SignalMessage).len(), 1);

        let deflate = template(&profile).with_payload_service(PayloadService {
            compression_mode: Some(CompressionMode::Deflate),
        });
        assert_eq!(validate(&profile, &deflate, ValidationMode::UserMessage).len(), 1);
    }

    fn user_message(properties: Vec<Property>, from: Vec<PartyId>) -> UserMessage {
        UserMessage {
            mpc: None,
            message_info: MessageInfo::new("m-1"),
            party_info: Some(PartyInfo {
                from: PartyRef {
                    party_ids: from,
                    role: None,
                },
                to: PartyRef {
                    party_ids: vec![PartyId::new(None, "b")],
                    role: None,
                },
            }),
            collaboration_info: None,
            message_properties: properties,
            payload_info: Vec::new(),
        }
    }

    #[test]
    fn test_four_corner_properties() {
        let registry = ProfileRegistry::standard(false);
        let bare = user_message(Vec::new(), vec![PartyId::new(None, "a")]);

        let mut errors = ErrorList::new();
        registry.get("cef").unwrap().validator().validate_user_message(&bare, &mut errors);
        assert_eq!(errors.failures().count(), 2);

        let mut errors = ErrorList::new();
        registry.get("entsog").unwrap().validator().validate_user_message(&bare, &mut errors);
        assert!(errors.is_empty());

        let complete = user_message(
            vec![Property::new("originalSender", "C1"), Property::new("finalRecipient", "C4")],
            vec![PartyId::new(None, "a"), PartyId::new(None, "a2")],
        );
        let mut errors = ErrorList::new();
        registry.get("cef").unwrap().validator().validate_user_message(&complete, &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.iter().next().unwrap().field, "UserMessage.PartyInfo.From");
    }

    #[test]
    fn test_peppol_identity_requires_signing_certificate() {
        let validator = As4Profile::new(&PEPPOL, false).validator();
        let message = user_message(Vec::new(), vec![PartyId::new(None, "a")]);
        let signing = CertificateInfo::new("CN=AP", b"cert-a".to_vec());
        let other = CertificateInfo::new("CN=AP", b"cert-b".to_vec());

        let mut errors = ErrorList::new();
        validator.validate_initiator_identity(&message, None, None, &mut errors);
        assert_eq!(errors.len(), 1);

        let mut errors = ErrorList::new();
        validator.validate_initiator_identity(&message, Some(&signing), Some(&signing), &mut errors);
        assert!(errors.is_empty());

        let mut errors = ErrorList::new();
        validator.validate_initiator_identity(&message, Some(&signing), Some(&other), &mut errors);
        assert_eq!(errors.len(), 1);
    }
}
