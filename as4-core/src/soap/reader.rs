//! Incoming envelope parsing

use super::xml::XmlElement;
use super::{SoapError, SoapResult, SoapVersion, DS_NS, EBBP_NS, WSSE11_NS, WSSE_NS, XENC_NS};
use crate::ebms::{
    AgreementRef, CollaborationInfo, MessageInfo, Messaging, PartInfo, PartyId, PartyInfo,
    PartyRef, Property, PullRequest, Receipt, ReceiptContent, Service, SignalKind, SignalMessage,
    SignatureReference, UserMessage, EBMS_NS,
};
use crate::pmode::WssVersion;
use crate::signal::{Category, ErrorRecord, Severity};
use chrono::{DateTime, Utc};

/// Informational summary of a `wsse:Security` header
///
/// Only algorithm identifiers and references are extracted here; the
/// cryptographic verification itself is done by the security processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityHeader {
    /// `ds:SignatureMethod/@Algorithm`
    pub signature_algorithm: Option<String>,
    /// `ds:DigestMethod/@Algorithm` of every signed reference
    pub digest_algorithms: Vec<String>,
    pub references: Vec<SignatureReference>,
    /// `xenc:EncryptedKey/xenc:EncryptionMethod/@Algorithm`
    pub key_transport_algorithms: Vec<String>,
    /// `xenc:EncryptedData/xenc:EncryptionMethod/@Algorithm`
    pub encryption_algorithms: Vec<String>,
    pub declared_wss_version: Option<WssVersion>,
    pub has_binary_security_token: bool,
}

impl SecurityHeader {
    pub fn is_signed(&self) -> bool {
        self.signature_algorithm.is_some()
    }

    pub fn is_encrypted(&self) -> bool {
        !self.encryption_algorithms.is_empty() || !self.key_transport_algorithms.is_empty()
    }
}

/// Result of reading one SOAP envelope
#[derive(Debug, Clone)]
pub struct ParsedEnvelope {
    pub soap_version: SoapVersion,
    /// Number of `eb:Messaging` header blocks found
    pub messaging_count: usize,
    /// The first `eb:Messaging` header block
    pub messaging: Option<Messaging>,
    pub security: Option<SecurityHeader>,
    pub body: Option<XmlElement>,
}

/// Parse a SOAP 1.1 or 1.2 envelope
///
/// Structural problems inside `eb:Messaging` that the ebMS checks report
/// on (missing ids, extra blocks) are not parse errors; they surface in
/// the returned structure.
pub fn parse_envelope(bytes: &[u8]) -> SoapResult<ParsedEnvelope> {
    let xml = std::str::from_utf8(bytes)?;
    let root = XmlElement::parse(xml)?;

    let soap_version = root
        .namespace
        .as_deref()
        .and_then(SoapVersion::from_namespace)
        .filter(|_| root.name == "Envelope")
        .ok_or_else(|| SoapError::NotAnEnvelope(root.name.clone()))?;
    let soap_ns = soap_version.namespace();

    let header = root.child(soap_ns, "Header");
    let body = root.child(soap_ns, "Body").cloned();

    let messaging_blocks: Vec<&XmlElement> = header
        .map(|h| h.children_named(EBMS_NS, "Messaging").collect())
        .unwrap_or_default();
    let messaging = match messaging_blocks.first() {
        Some(block) => Some(read_messaging(block)?),
        None => None,
    };

    let security = header
        .and_then(|h| h.child(WSSE_NS, "Security"))
        .map(|sec| read_security(sec, body.as_ref()));

    Ok(ParsedEnvelope {
        soap_version,
        messaging_count: messaging_blocks.len(),
        messaging,
        security,
        body,
    })
}

fn read_messaging(element: &XmlElement) -> SoapResult<Messaging> {
    let mut messaging = Messaging::default();
    for user in element.children_named(EBMS_NS, "UserMessage") {
        messaging.user_messages.push(read_user_message(user)?);
    }
    for signal in element.children_named(EBMS_NS, "SignalMessage") {
        messaging.signal_messages.push(read_signal_message(signal)?);
    }
    Ok(messaging)
}

fn read_message_info(element: Option<&XmlElement>) -> SoapResult<MessageInfo> {
    let Some(element) = element else {
        return Ok(MessageInfo {
            timestamp: None,
            message_id: String::new(),
            ref_to_message_id: None,
        });
    };

    let timestamp = match element.child_text(EBMS_NS, "Timestamp") {
        Some(ts) if !ts.is_empty() => Some(parse_timestamp(ts)?),
        _ => None,
    };

    Ok(MessageInfo {
        timestamp,
        message_id: element
            .child_text(EBMS_NS, "MessageId")
            .unwrap_or_default()
            .to_string(),
        ref_to_message_id: element
            .child_text(EBMS_NS, "RefToMessageId")
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    })
}

/// `xsd:dateTime`; a missing zone designator means UTC
fn parse_timestamp(value: &str) -> SoapResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| SoapError::InvalidValue {
            field: "Timestamp",
            value: value.to_string(),
        })
}

fn read_properties(element: Option<&XmlElement>) -> Vec<Property> {
    element
        .map(|props| {
            props
                .children_named(EBMS_NS, "Property")
                .map(|p| Property {
                    name: p.attr("name").unwrap_or_default().to_string(),
                    value: p.text.clone(),
                    prop_type: p.attr("type").map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn read_party(element: Option<&XmlElement>) -> PartyRef {
    let Some(element) = element else {
        return PartyRef::default();
    };
    PartyRef {
        party_ids: element
            .children_named(EBMS_NS, "PartyId")
            .map(|p| PartyId::new(p.attr("type"), p.text.clone()))
            .collect(),
        role: element.child_text(EBMS_NS, "Role").map(str::to_string),
    }
}

fn read_user_message(element: &XmlElement) -> SoapResult<UserMessage> {
    let message_info = read_message_info(element.child(EBMS_NS, "MessageInfo"))?;

    let party_info = element.child(EBMS_NS, "PartyInfo").map(|info| PartyInfo {
        from: read_party(info.child(EBMS_NS, "From")),
        to: read_party(info.child(EBMS_NS, "To")),
    });

    let collaboration_info = element.child(EBMS_NS, "CollaborationInfo").map(|info| {
        let service = info.child(EBMS_NS, "Service");
        CollaborationInfo {
            agreement_ref: info.child(EBMS_NS, "AgreementRef").map(|a| AgreementRef {
                value: a.text.clone(),
                ref_type: a.attr("type").map(str::to_string),
                pmode: a.attr("pmode").map(str::to_string),
            }),
            service: Service {
                value: service.map(|s| s.text.clone()).unwrap_or_default(),
                service_type: service.and_then(|s| s.attr("type")).map(str::to_string),
            },
            action: info.child_text(EBMS_NS, "Action").unwrap_or_default().to_string(),
            conversation_id: info
                .child_text(EBMS_NS, "ConversationId")
                .unwrap_or_default()
                .to_string(),
        }
    });

    let payload_info = element
        .child(EBMS_NS, "PayloadInfo")
        .map(|payload| {
            payload
                .children_named(EBMS_NS, "PartInfo")
                .map(|part| PartInfo {
                    href: part.attr("href").map(str::to_string),
                    properties: read_properties(part.child(EBMS_NS, "PartProperties")),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(UserMessage {
        mpc: element.attr("mpc").map(str::to_string),
        message_info,
        party_info,
        collaboration_info,
        message_properties: read_properties(element.child(EBMS_NS, "MessageProperties")),
        payload_info,
    })
}

fn read_signal_message(element: &XmlElement) -> SoapResult<SignalMessage> {
    let message_info = read_message_info(element.child(EBMS_NS, "MessageInfo"))?;

    let kind = if let Some(pull) = element.child(EBMS_NS, "PullRequest") {
        SignalKind::PullRequest(PullRequest {
            mpc: pull
                .attr("mpc")
                .unwrap_or(crate::ebms::DEFAULT_MPC)
                .to_string(),
        })
    } else if let Some(receipt) = element.child(EBMS_NS, "Receipt") {
        SignalKind::Receipt(read_receipt(receipt)?)
    } else {
        let errors = element
            .children_named(EBMS_NS, "Error")
            .map(read_error)
            .collect::<SoapResult<Vec<_>>>()?;
        SignalKind::Errors(errors)
    };

    Ok(SignalMessage { message_info, kind })
}

fn read_receipt(element: &XmlElement) -> SoapResult<Receipt> {
    let content = if let Some(nri) = element.child(EBBP_NS, "NonRepudiationInformation") {
        ReceiptContent::NonRepudiation(read_references(nri))
    } else if let Some(user) = element.child(EBMS_NS, "UserMessage") {
        ReceiptContent::UserMessage(Box::new(read_user_message(user)?))
    } else {
        ReceiptContent::Other
    };
    Ok(Receipt { content })
}

fn read_error(element: &XmlElement) -> SoapResult<ErrorRecord> {
    let severity_attr = element.attr("severity").unwrap_or_default();
    let severity = Severity::from_wire(severity_attr).ok_or_else(|| SoapError::InvalidValue {
        field: "Error/@severity",
        value: severity_attr.to_string(),
    })?;

    Ok(ErrorRecord {
        code: element.attr("errorCode").unwrap_or_default().to_string(),
        severity,
        category: element.attr("category").and_then(Category::from_wire),
        short_description: element.attr("shortDescription").map(str::to_string),
        description: element
            .child_text(EBMS_NS, "Description")
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        error_detail: element
            .child_text(EBMS_NS, "ErrorDetail")
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        ref_to_message_in_error: element
            .attr("refToMessageInError")
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        origin: element.attr("origin").map(str::to_string),
    })
}

fn read_references(scope: &XmlElement) -> Vec<SignatureReference> {
    scope
        .descendants(DS_NS, "Reference")
        .into_iter()
        .map(|reference| SignatureReference {
            uri: reference.attr("URI").unwrap_or_default().to_string(),
            digest_algorithm: reference
                .child(DS_NS, "DigestMethod")
                .and_then(|d| d.attr("Algorithm"))
                .unwrap_or_default()
                .to_string(),
            digest_value: reference
                .child_text(DS_NS, "DigestValue")
                .unwrap_or_default()
                .to_string(),
        })
        .collect()
}

fn read_security(security: &XmlElement, body: Option<&XmlElement>) -> SecurityHeader {
    let signature = security.child(DS_NS, "Signature");
    let signed_info = signature.and_then(|s| s.child(DS_NS, "SignedInfo"));

    let signature_algorithm = signed_info
        .and_then(|si| si.child(DS_NS, "SignatureMethod"))
        .and_then(|m| m.attr("Algorithm"))
        .map(str::to_string);

    let references = signed_info.map(read_references).unwrap_or_default();
    let mut digest_algorithms: Vec<String> = Vec::new();
    for reference in &references {
        if !reference.digest_algorithm.is_empty()
            && !digest_algorithms.contains(&reference.digest_algorithm)
        {
            digest_algorithms.push(reference.digest_algorithm.clone());
        }
    }

    let key_transport_algorithms = encryption_methods(security.descendants(XENC_NS, "EncryptedKey"));

    let mut encrypted_data = security.descendants(XENC_NS, "EncryptedData");
    if let Some(body) = body {
        encrypted_data.extend(body.descendants(XENC_NS, "EncryptedData"));
    }
    let encryption_algorithms = encryption_methods(encrypted_data);

    let declared_wss_version = if security.uses_namespace(WSSE11_NS) {
        Some(WssVersion::Wss111)
    } else if signature.is_some() || !key_transport_algorithms.is_empty() {
        Some(WssVersion::Wss10)
    } else {
        None
    };

    SecurityHeader {
        signature_algorithm,
        digest_algorithms,
        references,
        key_transport_algorithms,
        encryption_algorithms,
        declared_wss_version,
        has_binary_security_token: security.child(WSSE_NS, "BinarySecurityToken").is_some(),
    }
}

fn encryption_methods(elements: Vec<&XmlElement>) -> Vec<String> {
    let mut algorithms: Vec<String> = Vec::new();
    for element in elements {
        let algorithm = element
            .child(XENC_NS, "EncryptionMethod")
            .and_then(|m| m.attr("Algorithm"));
        if let Some(algorithm) = algorithm {
            if !algorithms.iter().any(|a| a == algorithm) {
                algorithms.push(algorithm.to_string());
            }
        }
    }
    algorithms
}
