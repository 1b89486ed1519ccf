//! Outgoing envelope serialization
//!
//! Envelopes are written through a [`quick_xml::Writer`] with fixed
//! prefixes (`S11`/`S12`, `eb`, `ebbp`, `ds`). The output is unsigned; the
//! security processor signs and encrypts it afterwards.

use super::{SoapError, SoapResult, SoapVersion, DS_NS, EBBP_NS};
use crate::ebms::{
    MessageInfo, PartyRef, Property, ReceiptContent, SignalKind, SignalMessage, UserMessage,
    EBMS_NS,
};
use chrono::SecondsFormat;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new() -> SoapResult<Self> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(Self { writer })
    }

    fn start<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
        BytesStart::new(name).with_attributes(attrs.iter().copied())
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> SoapResult<()> {
        self.writer.write_event(Event::Start(Self::start(name, attrs)))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> SoapResult<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> SoapResult<()> {
        self.writer.write_event(Event::Empty(Self::start(name, attrs)))?;
        Ok(())
    }

    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> SoapResult<()> {
        self.open(name, attrs)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> SoapResult<String> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| SoapError::Encoding(e.utf8_error()))
    }
}

fn prefix(version: SoapVersion) -> &'static str {
    match version {
        SoapVersion::Soap11 => "S11",
        SoapVersion::Soap12 => "S12",
    }
}

fn write_envelope(
    version: SoapVersion,
    messaging: impl FnOnce(&mut XmlWriter) -> SoapResult<()>,
) -> SoapResult<String> {
    let soap = prefix(version);
    let envelope = format!("{}:Envelope", soap);
    let header = format!("{}:Header", soap);
    let body = format!("{}:Body", soap);
    let must_understand = format!("{}:mustUnderstand", soap);
    let soap_xmlns = format!("xmlns:{}", soap);

    let mut w = XmlWriter::new()?;
    w.open(
        &envelope,
        &[(soap_xmlns.as_str(), version.namespace()), ("xmlns:eb", EBMS_NS)],
    )?;
    w.open(&header, &[])?;
    w.open(
        "eb:Messaging",
        &[(must_understand.as_str(), version.must_understand_true())],
    )?;
    messaging(&mut w)?;
    w.close("eb:Messaging")?;
    w.close(&header)?;
    w.empty(&body, &[])?;
    w.close(&envelope)?;
    w.finish()
}

/// Serialize a SOAP envelope carrying one user message
pub fn write_user_message_envelope(user_message: &UserMessage, version: SoapVersion) -> SoapResult<String> {
    write_envelope(version, |w| write_user_message(w, user_message))
}

/// Serialize a SOAP envelope carrying one signal message
pub fn write_signal_envelope(signal: &SignalMessage, version: SoapVersion) -> SoapResult<String> {
    write_envelope(version, |w| write_signal_message(w, signal))
}

fn write_message_info(w: &mut XmlWriter, info: &MessageInfo) -> SoapResult<()> {
    w.open("eb:MessageInfo", &[])?;
    let timestamp = info
        .timestamp
        .unwrap_or_else(chrono::Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    w.leaf("eb:Timestamp", &[], &timestamp)?;
    w.leaf("eb:MessageId", &[], &info.message_id)?;
    if let Some(ref_to) = &info.ref_to_message_id {
        w.leaf("eb:RefToMessageId", &[], ref_to)?;
    }
    w.close("eb:MessageInfo")
}

fn write_party(w: &mut XmlWriter, name: &str, party: &PartyRef) -> SoapResult<()> {
    w.open(name, &[])?;
    for id in &party.party_ids {
        match &id.id_type {
            Some(id_type) => w.leaf("eb:PartyId", &[("type", id_type.as_str())], &id.value)?,
            None => w.leaf("eb:PartyId", &[], &id.value)?,
        }
    }
    if let Some(role) = &party.role {
        w.leaf("eb:Role", &[], role)?;
    }
    w.close(name)
}

fn write_properties(w: &mut XmlWriter, name: &str, properties: &[Property]) -> SoapResult<()> {
    if properties.is_empty() {
        return Ok(());
    }
    w.open(name, &[])?;
    for property in properties {
        match &property.prop_type {
            Some(prop_type) => w.leaf(
                "eb:Property",
                &[("name", property.name.as_str()), ("type", prop_type.as_str())],
                &property.value,
            )?,
            None => w.leaf("eb:Property", &[("name", property.name.as_str())], &property.value)?,
        }
    }
    w.close(name)
}

fn write_user_message(w: &mut XmlWriter, user: &UserMessage) -> SoapResult<()> {
    match &user.mpc {
        Some(mpc) => w.open("eb:UserMessage", &[("mpc", mpc.as_str())])?,
        None => w.open("eb:UserMessage", &[])?,
    }
    write_message_info(w, &user.message_info)?;

    if let Some(party_info) = &user.party_info {
        w.open("eb:PartyInfo", &[])?;
        write_party(w, "eb:From", &party_info.from)?;
        write_party(w, "eb:To", &party_info.to)?;
        w.close("eb:PartyInfo")?;
    }

    if let Some(collab) = &user.collaboration_info {
        w.open("eb:CollaborationInfo", &[])?;
        if let Some(agreement) = &collab.agreement_ref {
            let mut attrs: Vec<(&str, &str)> = Vec::new();
            if let Some(ref_type) = &agreement.ref_type {
                attrs.push(("type", ref_type.as_str()));
            }
            if let Some(pmode) = &agreement.pmode {
                attrs.push(("pmode", pmode.as_str()));
            }
            w.leaf("eb:AgreementRef", &attrs, &agreement.value)?;
        }
        match &collab.service.service_type {
            Some(service_type) => {
                w.leaf("eb:Service", &[("type", service_type.as_str())], &collab.service.value)?
            }
            None => w.leaf("eb:Service", &[], &collab.service.value)?,
        }
        w.leaf("eb:Action", &[], &collab.action)?;
        w.leaf("eb:ConversationId", &[], &collab.conversation_id)?;
        w.close("eb:CollaborationInfo")?;
    }

    write_properties(w, "eb:MessageProperties", &user.message_properties)?;

    if !user.payload_info.is_empty() {
        w.open("eb:PayloadInfo", &[])?;
        for part in &user.payload_info {
            match &part.href {
                Some(href) => w.open("eb:PartInfo", &[("href", href.as_str())])?,
                None => w.open("eb:PartInfo", &[])?,
            }
            write_properties(w, "eb:PartProperties", &part.properties)?;
            w.close("eb:PartInfo")?;
        }
        w.close("eb:PayloadInfo")?;
    }

    w.close("eb:UserMessage")
}

fn write_signal_message(w: &mut XmlWriter, signal: &SignalMessage) -> SoapResult<()> {
    w.open("eb:SignalMessage", &[])?;
    write_message_info(w, &signal.message_info)?;

    match &signal.kind {
        SignalKind::PullRequest(pull) => w.empty("eb:PullRequest", &[("mpc", pull.mpc.as_str())])?,
        SignalKind::Receipt(receipt) => {
            w.open("eb:Receipt", &[])?;
            match &receipt.content {
                ReceiptContent::NonRepudiation(references) => {
                    w.open(
                        "ebbp:NonRepudiationInformation",
                        &[("xmlns:ebbp", EBBP_NS), ("xmlns:ds", DS_NS)],
                    )?;
                    for reference in references {
                        w.open("ebbp:MessagePartNRInformation", &[])?;
                        w.open("ds:Reference", &[("URI", reference.uri.as_str())])?;
                        w.empty("ds:DigestMethod", &[("Algorithm", reference.digest_algorithm.as_str())])?;
                        w.leaf("ds:DigestValue", &[], &reference.digest_value)?;
                        w.close("ds:Reference")?;
                        w.close("ebbp:MessagePartNRInformation")?;
                    }
                    w.close("ebbp:NonRepudiationInformation")?;
                }
                ReceiptContent::UserMessage(user) => write_user_message(w, user)?,
                ReceiptContent::Other => {}
            }
            w.close("eb:Receipt")?;
        }
        SignalKind::Errors(errors) => {
            for error in errors {
                let mut attrs: Vec<(&str, &str)> = vec![
                    ("errorCode", error.code.as_str()),
                    ("severity", error.severity.as_str()),
                ];
                if let Some(category) = &error.category {
                    attrs.push(("category", category.as_str()));
                }
                if let Some(short) = &error.short_description {
                    attrs.push(("shortDescription", short.as_str()));
                }
                if let Some(origin) = &error.origin {
                    attrs.push(("origin", origin.as_str()));
                }
                if let Some(ref_to) = &error.ref_to_message_in_error {
                    attrs.push(("refToMessageInError", ref_to.as_str()));
                }

                w.open("eb:Error", &attrs)?;
                if let Some(description) = &error.description {
                    w.leaf("eb:Description", &[("xml:lang", "en")], description)?;
                }
                if let Some(detail) = &error.error_detail {
                    w.leaf("eb:ErrorDetail", &[], detail)?;
                }
                w.close("eb:Error")?;
            }
        }
    }

    w.close("eb:SignalMessage")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebms::{CollaborationInfo, PartInfo, PartyId, PartyInfo, Service, SignatureReference};
    use crate::signal::{build_error, build_receipt, build_signal_message_with_id, EBMS_INVALID_HEADER};
    use crate::soap::parse_envelope;

    fn user_message() -> UserMessage {
        UserMessage {
            mpc: None,
            message_info: MessageInfo::new("m-1"),
            party_info: Some(PartyInfo {
                from: PartyRef {
                    party_ids: vec![PartyId::new(Some("urn:t"), "a&b")],
                    role: Some("urn:r:init".to_string()),
                },
                to: PartyRef {
                    party_ids: vec![PartyId::new(None, "c")],
                    role: Some("urn:r:resp".to_string()),
                },
            }),
            collaboration_info: Some(CollaborationInfo {
                agreement_ref: None,
                service: Service {
                    value: "urn:svc".to_string(),
                    service_type: None,
                },
                action: "Act<1>".to_string(),
                conversation_id: "conv".to_string(),
            }),
            message_properties: vec![Property::new("originalSender", "C1")],
            payload_info: vec![PartInfo {
                href: Some("cid:p1".to_string()),
                properties: vec![Property::new("MimeType", "text/plain")],
            }],
        }
    }

    #[test]
    fn test_user_message_reads_back() {
        let user = user_message();
        let xml = write_user_message_envelope(&user, SoapVersion::Soap12).unwrap();
        assert!(xml.contains("S12:mustUnderstand=\"true\""));
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("a&amp;b"));
        assert!(xml.contains("Act&lt;1&gt;"));

        let parsed = parse_envelope(xml.as_bytes()).unwrap();
        let back = &parsed.messaging.unwrap().user_messages[0];
        assert_eq!(back.party_info, user.party_info);
        assert_eq!(back.collaboration_info, user.collaboration_info);
        assert_eq!(back.payload_info, user.payload_info);
        assert_eq!(back.message_properties, user.message_properties);
    }

    #[test]
    fn test_error_signal_soap11() {
        let signal = build_signal_message_with_id(
            "sig-1".to_string(),
            vec![build_error(&EBMS_INVALID_HEADER, Some("m-1"), Some("ebMS")).with_detail("no header")],
        );
        let xml = write_signal_envelope(&signal, SoapVersion::Soap11).unwrap();
        assert!(xml.contains("S11:mustUnderstand=\"1\""));
        assert!(xml.contains("errorCode=\"EBMS:0009\""));

        let parsed = parse_envelope(xml.as_bytes()).unwrap();
        let back = &parsed.messaging.unwrap().signal_messages[0];
        assert_eq!(back.ref_to_message_id(), Some("m-1"));
        assert_eq!(back.errors(), signal.errors());
    }

    #[test]
    fn test_non_repudiation_receipt() {
        let refs = vec![SignatureReference {
            uri: "#body".to_string(),
            digest_algorithm: "http://www.w3.org/2001/04/xmlenc#sha256".to_string(),
            digest_value: "xyz=".to_string(),
        }];
        let receipt = build_receipt("r-1".to_string(), &user_message(), true, &refs);
        let xml = write_signal_envelope(&receipt, SoapVersion::Soap12).unwrap();
        assert!(xml.contains("ebbp:NonRepudiationInformation"));

        let parsed = parse_envelope(xml.as_bytes()).unwrap();
        let back = &parsed.messaging.unwrap().signal_messages[0];
        assert_eq!(back.kind, receipt.kind);
    }
}
