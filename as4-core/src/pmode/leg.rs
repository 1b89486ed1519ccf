//! PMode legs: protocol, business information, error handling, reliability

use super::security::LegSecurity;
use crate::soap::SoapVersion;
use serde::{Deserialize, Serialize};

/// PMode[1].Protocol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegProtocol {
    /// Endpoint URL of the receiving MSH (absent on responder-only PModes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub soap_version: SoapVersion,
}

impl LegProtocol {
    pub fn new(address: Option<&str>, soap_version: SoapVersion) -> Self {
        Self {
            address: address.map(str::to_string),
            soap_version,
        }
    }

    /// Lower-cased URL scheme of the address (`https`, `http`, ...)
    pub fn address_protocol(&self) -> Option<String> {
        let address = self.address.as_deref()?.trim();
        let (scheme, _) = address.split_once("://")?;
        if scheme.is_empty() {
            None
        } else {
            Some(scheme.to_ascii_lowercase())
        }
    }
}

/// PMode[1].BusinessInfo.Properties entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PModeProperty {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// XML schema data type of the value
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default)]
    pub required: bool,
}

fn default_data_type() -> String {
    "string".to_string()
}

/// PMode[1].BusinessInfo.PayloadProfile entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadProfile {
    pub name: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsd_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_kb: Option<u32>,
    #[serde(default)]
    pub required: bool,
}

/// PMode[1].BusinessInfo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PModeProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload_profiles: Vec<PayloadProfile>,
}

/// PMode[1].ErrorHandling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorHandling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_sender_error_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_receiver_error_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_as_response: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_process_error_notify_consumer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_process_error_notify_producer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_delivery_failures_notify_producer: Option<bool>,
}

impl ErrorHandling {
    /// All notification flags set to `true`, errors reported on the response
    pub fn report_everything() -> Self {
        Self {
            report_sender_error_to: None,
            report_receiver_error_to: None,
            report_as_response: Some(true),
            report_process_error_notify_consumer: Some(true),
            report_process_error_notify_producer: Some(true),
            report_delivery_failures_notify_producer: Some(true),
        }
    }
}

/// PMode[1].Reliability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reliability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_least_once_contract: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_least_once_ack_on_delivery: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_most_once_contract: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_order_contract: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval_ms: Option<u64>,
}

/// One direction of exchange within a PMode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(default)]
    pub protocol: LegProtocol,
    #[serde(default)]
    pub business_info: BusinessInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handling: Option<ErrorHandling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reliability: Option<Reliability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<LegSecurity>,
}

impl Leg {
    pub fn new(protocol: LegProtocol) -> Self {
        Self {
            protocol,
            ..Default::default()
        }
    }

    pub fn with_business_info(mut self, business_info: BusinessInfo) -> Self {
        self.business_info = business_info;
        self
    }

    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = Some(error_handling);
        self
    }

    pub fn with_security(mut self, security: LegSecurity) -> Self {
        self.security = Some(security);
        self
    }

    pub fn with_reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = Some(reliability);
        self
    }

    /// `ReportAsResponse`, treating "not configured" as `true`
    pub fn reports_errors_as_response(&self) -> bool {
        self.error_handling
            .as_ref()
            .and_then(|e| e.report_as_response)
            .unwrap_or(true)
    }
}
