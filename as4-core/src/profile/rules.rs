//! Rule-table driven profile validation
//!
//! Every shipped profile is the same set of checks parameterised by a
//! [`ProfileRules`] constant.

use super::{ProfileValidator, ValidationMode};
use crate::ebms::{SignalKind, SignalMessage, UserMessage};
use crate::issues::ErrorList;
use crate::pmode::{
    CompressionMode, DigestAlgorithm, EncryptionAlgorithm, Leg, Mep, MepBinding, PMode,
    ReplyPattern, SignatureAlgorithm, WssVersion,
};
use crate::soap::SoapVersion;
use crate::traits::CertificateInfo;

/// Parameters of one interoperability profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileRules {
    pub id: &'static str,
    pub display_name: &'static str,
    pub soap_version: SoapVersion,
    /// Required on PModes, first entry of the accepted set
    pub signature_algorithm: SignatureAlgorithm,
    pub digest_algorithm: DigestAlgorithm,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub wss_version: WssVersion,
    /// Accepted on incoming messages
    pub accepted_signature_algorithms: &'static [SignatureAlgorithm],
    pub accepted_digest_algorithms: &'static [DigestAlgorithm],
    pub accepted_encryption_algorithms: &'static [EncryptionAlgorithm],
    pub accepted_wss_versions: &'static [WssVersion],
    /// `originalSender` and `finalRecipient` message properties are mandatory
    pub four_corner: bool,
    /// The sending access point is identified by its signing certificate
    pub certificate_bound_identity: bool,
    /// PartyId type used by the PMode template
    pub party_id_type: Option<&'static str>,
    /// Compression used by the PMode template
    pub template_compression: Option<CompressionMode>,
}

/// [`ProfileValidator`] evaluating a [`ProfileRules`] table
#[derive(Debug, Clone)]
pub struct RuleValidator {
    rules: &'static ProfileRules,
    debug_mode: bool,
}

impl RuleValidator {
    pub fn new(rules: &'static ProfileRules, debug_mode: bool) -> Self {
        Self { rules, debug_mode }
    }

    pub fn rules(&self) -> &'static ProfileRules {
        self.rules
    }

    fn validate_leg(&self, field: &str, leg: &Leg, mode: ValidationMode, errors: &mut ErrorList) {
        let rules = self.rules;

        if mode == ValidationMode::UserMessage {
            match leg.protocol.address_protocol().as_deref() {
                None | Some("https") => {}
                Some("http") if self.debug_mode => {}
                Some("http") => errors.failure(
                    format!("{}.Protocol.Address", field),
                    "plain HTTP is only allowed in debug mode",
                ),
                Some(other) => errors.failure(
                    format!("{}.Protocol.Address", field),
                    format!("unsupported address protocol '{}'", other),
                ),
            }
        }

        if leg.protocol.soap_version != rules.soap_version {
            errors.failure(
                format!("{}.Protocol.SoapVersion", field),
                format!(
                    "must be {} but is {}",
                    rules.soap_version.as_str(),
                    leg.protocol.soap_version.as_str()
                ),
            );
        }

        if let Some(security) = &leg.security {
            let sec = format!("{}.Security", field);

            match security.x509_signature_algorithm {
                None => errors.failure(format!("{}.X509SignatureAlgorithm", sec), "is missing"),
                Some(alg) if alg != rules.signature_algorithm => errors.failure(
                    format!("{}.X509SignatureAlgorithm", sec),
                    format!("must use {}", rules.signature_algorithm.uri()),
                ),
                Some(_) => {}
            }

            match security.x509_signature_digest_algorithm {
                None => errors.failure(format!("{}.X509SignatureHashFunction", sec), "is missing"),
                Some(alg) if alg != rules.digest_algorithm => errors.failure(
                    format!("{}.X509SignatureHashFunction", sec),
                    format!("must use {}", rules.digest_algorithm.uri()),
                ),
                Some(_) => {}
            }

            match security.x509_encryption_algorithm {
                None => errors.failure(format!("{}.X509EncryptionAlgorithm", sec), "is missing"),
                Some(alg) if alg != rules.encryption_algorithm => errors.failure(
                    format!("{}.X509EncryptionAlgorithm", sec),
                    format!("must use {}", rules.encryption_algorithm.uri()),
                ),
                Some(_) => {}
            }

            if let Some(version) = security.wss_version {
                if version != rules.wss_version {
                    errors.failure(
                        format!("{}.WSSVersion", sec),
                        format!("must be {} but is {}", rules.wss_version, version),
                    );
                }
            }

            match security.pmode_authorize {
                None => errors.failure(format!("{}.PModeAuthorize", sec), "is missing"),
                Some(true) => errors.failure(format!("{}.PModeAuthorize", sec), "must be false"),
                Some(false) => {}
            }

            if security.send_receipt == Some(true)
                && security.send_receipt_reply_pattern != Some(ReplyPattern::Response)
            {
                errors.failure(
                    format!("{}.SendReceiptReplyPattern", sec),
                    "must be 'response' when receipts are sent",
                );
            }
        }

        let eh = format!("{}.ErrorHandling", field);
        match &leg.error_handling {
            None => errors.failure(eh, "is missing"),
            Some(handling) => {
                match handling.report_as_response {
                    None => errors.failure(format!("{}.Report.AsResponse", eh), "is missing"),
                    Some(false) => errors.failure(format!("{}.Report.AsResponse", eh), "must be true"),
                    Some(true) => {}
                }
                match handling.report_process_error_notify_consumer {
                    None => errors.failure(
                        format!("{}.Report.ProcessErrorNotifyConsumer", eh),
                        "is missing",
                    ),
                    Some(false) => errors.warning(
                        format!("{}.Report.ProcessErrorNotifyConsumer", eh),
                        "should be true",
                    ),
                    Some(true) => {}
                }
                match handling.report_delivery_failures_notify_producer {
                    None => errors.failure(
                        format!("{}.Report.DeliveryFailuresNotifyProducer", eh),
                        "is missing",
                    ),
                    Some(false) => errors.warning(
                        format!("{}.Report.DeliveryFailuresNotifyProducer", eh),
                        "should be true",
                    ),
                    Some(true) => {}
                }
            }
        }
    }
}

impl ProfileValidator for RuleValidator {
    fn profile_id(&self) -> &str {
        self.rules.id
    }

    fn soap_version(&self) -> SoapVersion {
        self.rules.soap_version
    }

    fn accepted_signature_algorithms(&self) -> &[SignatureAlgorithm] {
        self.rules.accepted_signature_algorithms
    }

    fn accepted_digest_algorithms(&self) -> &[DigestAlgorithm] {
        self.rules.accepted_digest_algorithms
    }

    fn accepted_encryption_algorithms(&self) -> &[EncryptionAlgorithm] {
        self.rules.accepted_encryption_algorithms
    }

    fn accepted_wss_versions(&self) -> &[WssVersion] {
        self.rules.accepted_wss_versions
    }

    fn validate_pmode(&self, pmode: &PMode, mode: ValidationMode, errors: &mut ErrorList) {
        let field = format!("PMode[{}]", pmode.id);

        match &pmode.leg1 {
            Some(leg) => self.validate_leg(&format!("{}.Leg1", field), leg, mode, errors),
            None => errors.failure(format!("{}.Leg1", field), "is missing"),
        }
        if let Some(leg) = &pmode.leg2 {
            self.validate_leg(&format!("{}.Leg2", field), leg, mode, errors);
        }

        if let Some(compression) = pmode.compression_mode() {
            if compression != CompressionMode::Gzip {
                errors.failure(
                    format!("{}.PayloadService.CompressionType", field),
                    format!("only {} is supported", CompressionMode::Gzip.mime_type()),
                );
            }
        }

        // Pull bindings are served when answering a pull request
        let supported = match (pmode.mep, pmode.mep_binding) {
            (Mep::OneWay, MepBinding::Push) | (Mep::TwoWay, MepBinding::PushPush) => true,
            (Mep::OneWay, MepBinding::Pull)
            | (Mep::TwoWay, MepBinding::PushPull)
            | (Mep::TwoWay, MepBinding::PullPush) => mode == ValidationMode::SignalMessage,
            _ => false,
        };
        if !supported {
            errors.failure(
                format!("{}.MEPBinding", field),
                format!(
                    "{} with {} is not supported by the {} profile",
                    pmode.mep, pmode.mep_binding, self.rules.id
                ),
            );
        }
    }

    fn validate_user_message(&self, user_message: &UserMessage, errors: &mut ErrorList) {
        if user_message.message_id().trim().is_empty() {
            errors.failure("UserMessage.MessageInfo.MessageId", "is missing");
        }

        if self.rules.four_corner {
            if user_message.original_sender().map_or(true, |v| v.trim().is_empty()) {
                errors.failure(
                    "UserMessage.MessageProperties.originalSender",
                    "is required by the four-corner topology",
                );
            }
            if user_message.final_recipient().map_or(true, |v| v.trim().is_empty()) {
                errors.failure(
                    "UserMessage.MessageProperties.finalRecipient",
                    "is required by the four-corner topology",
                );
            }
        }

        if user_message.from_party_ids().len() > 1 {
            errors.failure("UserMessage.PartyInfo.From", "must contain a single PartyId");
        }
        if user_message.to_party_ids().len() > 1 {
            errors.failure("UserMessage.PartyInfo.To", "must contain a single PartyId");
        }
    }

    fn validate_signal_message(&self, signal: &SignalMessage, errors: &mut ErrorList) {
        if signal.message_id().trim().is_empty() {
            errors.failure("SignalMessage.MessageInfo.MessageId", "is missing");
        }
        if let SignalKind::PullRequest(pull) = &signal.kind {
            if pull.mpc.trim().is_empty() {
                errors.failure("SignalMessage.PullRequest.mpc", "is missing");
            }
        }
    }

    fn validate_initiator_identity(
        &self,
        _user_message: &UserMessage,
        signing_certificate: Option<&CertificateInfo>,
        tls_client_certificate: Option<&CertificateInfo>,
        errors: &mut ErrorList,
    ) {
        if !self.rules.certificate_bound_identity {
            return;
        }

        let Some(signing) = signing_certificate else {
            errors.failure("Security.SigningCertificate", "is required to identify the sender");
            return;
        };

        if let Some(tls) = tls_client_certificate {
            if tls.fingerprint() != signing.fingerprint() {
                errors.failure(
                    "Security.SigningCertificate",
                    "does not match the TLS client certificate",
                );
            }
        }
    }
}
