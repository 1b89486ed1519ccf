//! ebMS3 / AS4 error catalog
//!
//! The codes, categories and severities are fixed by the ebMS3 Core
//! specification (section 6.7) and the AS4 profile. They are reproduced
//! verbatim so that partners can interpret the signals we emit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an ebMS error (`@severity` on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Failure,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Failure => "failure",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warning" => Some(Severity::Warning),
            "failure" => Some(Severity::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an ebMS error (`@category` on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Content,
    Communication,
    Unpackaging,
    Processing,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Content => "Content",
            Category::Communication => "Communication",
            Category::Unpackaging => "Unpackaging",
            Category::Processing => "Processing",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim() {
            "Content" => Some(Category::Content),
            "Communication" => Some(Category::Communication),
            "Unpackaging" => Some(Category::Unpackaging),
            "Processing" => Some(Category::Processing),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the static error catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EbmsError {
    pub code: &'static str,
    pub severity: Severity,
    pub short_description: &'static str,
    pub category: Category,
    pub description: &'static str,
}

impl fmt::Display for EbmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.short_description)
    }
}

pub const EBMS_VALUE_NOT_RECOGNIZED: EbmsError = EbmsError {
    code: "EBMS:0001",
    severity: Severity::Failure,
    short_description: "ValueNotRecognized",
    category: Category::Content,
    description: "Although the message document is well formed and schema valid, some element/attribute contains a value that could not be recognized and therefore could not be used by the MSH.",
};

pub const EBMS_FEATURE_NOT_SUPPORTED: EbmsError = EbmsError {
    code: "EBMS:0002",
    severity: Severity::Warning,
    short_description: "FeatureNotSupported",
    category: Category::Content,
    description: "Although the message document is well formed and schema valid, some element/attribute value cannot be processed as expected because the related feature is not supported by the MSH.",
};

pub const EBMS_VALUE_INCONSISTENT: EbmsError = EbmsError {
    code: "EBMS:0003",
    severity: Severity::Failure,
    short_description: "ValueInconsistent",
    category: Category::Content,
    description: "Although the message document is well formed and schema valid, some element/attribute value is inconsistent either with the content of other element/attribute, or with the processing mode of the MSH, or with the normal rules of the ebMS specification.",
};

pub const EBMS_OTHER: EbmsError = EbmsError {
    code: "EBMS:0004",
    severity: Severity::Failure,
    short_description: "Other",
    category: Category::Content,
    description: "An error occurred that is not covered explicitly by any other definition.",
};

pub const EBMS_CONNECTION_FAILURE: EbmsError = EbmsError {
    code: "EBMS:0005",
    severity: Severity::Failure,
    short_description: "ConnectionFailure",
    category: Category::Communication,
    description: "The MSH is experiencing temporary or permanent failure in trying to open a transport connection with a remote MSH.",
};

pub const EBMS_EMPTY_MESSAGE_PARTITION_CHANNEL: EbmsError = EbmsError {
    code: "EBMS:0006",
    severity: Severity::Warning,
    short_description: "EmptyMessagePartitionChannel",
    category: Category::Communication,
    description: "There is no message available for pulling from this MPC at this moment.",
};

pub const EBMS_MIME_INCONSISTENCY: EbmsError = EbmsError {
    code: "EBMS:0007",
    severity: Severity::Failure,
    short_description: "MimeInconsistency",
    category: Category::Unpackaging,
    description: "The use of MIME is not consistent with the required usage in this specification.",
};

pub const EBMS_FEATURE_NOT_SUPPORTED_INCONSISTENCY: EbmsError = EbmsError {
    code: "EBMS:0008",
    severity: Severity::Failure,
    short_description: "FeatureNotSupportedInconsistency",
    category: Category::Unpackaging,
    description: "Although the message document is well formed and schema valid, the presence or absence of some element/attribute is not consistent with the capability of the MSH, with respect to supported features.",
};

pub const EBMS_INVALID_HEADER: EbmsError = EbmsError {
    code: "EBMS:0009",
    severity: Severity::Failure,
    short_description: "InvalidHeader",
    category: Category::Unpackaging,
    description: "The ebMS header is either not well formed as an XML document, or does not conform to the ebMS packaging rules.",
};

pub const EBMS_PROCESSING_MODE_MISMATCH: EbmsError = EbmsError {
    code: "EBMS:0010",
    severity: Severity::Failure,
    short_description: "ProcessingModeMismatch",
    category: Category::Processing,
    description: "The ebMS header or another header (e.g. reliability, security) expected by the MSH is not compatible with the expected content, based on the associated P-Mode.",
};

pub const EBMS_EXTERNAL_PAYLOAD_ERROR: EbmsError = EbmsError {
    code: "EBMS:0011",
    severity: Severity::Failure,
    short_description: "ExternalPayloadError",
    category: Category::Content,
    description: "The MSH is unable to resolve an external payload reference (i.e. a Part that is not contained within the ebMS Message, as identified by a PartInfo/href URI).",
};

pub const EBMS_FAILED_AUTHENTICATION: EbmsError = EbmsError {
    code: "EBMS:0101",
    severity: Severity::Failure,
    short_description: "FailedAuthentication",
    category: Category::Processing,
    description: "The signature in the Security header intended for the \"ebms\" SOAP actor, could not be validated by the Security module.",
};

pub const EBMS_FAILED_DECRYPTION: EbmsError = EbmsError {
    code: "EBMS:0102",
    severity: Severity::Failure,
    short_description: "FailedDecryption",
    category: Category::Processing,
    description: "The encrypted data reference the Security header intended for the \"ebms\" SOAP actor could not be decrypted by the Security Module.",
};

pub const EBMS_POLICY_NONCOMPLIANCE: EbmsError = EbmsError {
    code: "EBMS:0103",
    severity: Severity::Failure,
    short_description: "PolicyNoncompliance",
    category: Category::Processing,
    description: "The processor determined that the message's security methods, parameters, scope or other security policy-level requirements or agreements were not satisfied.",
};

pub const EBMS_DYSFUNCTIONAL_RELIABILITY: EbmsError = EbmsError {
    code: "EBMS:0201",
    severity: Severity::Failure,
    short_description: "DysfunctionalReliability",
    category: Category::Processing,
    description: "Some reliability function as implemented by the Reliability module, is not operational, or the reliability state associated with this message sequence is not valid.",
};

pub const EBMS_DELIVERY_FAILURE: EbmsError = EbmsError {
    code: "EBMS:0202",
    severity: Severity::Failure,
    short_description: "DeliveryFailure",
    category: Category::Communication,
    description: "Although the message was sent under Guaranteed delivery requirement, the Reliability module could not get assurance that the message was properly delivered, in spite of resending efforts.",
};

pub const EBMS_MISSING_RECEIPT: EbmsError = EbmsError {
    code: "EBMS:0301",
    severity: Severity::Failure,
    short_description: "MissingReceipt",
    category: Category::Communication,
    description: "A Receipt has not been received for a message that was previously sent by the MSH generating this error.",
};

pub const EBMS_INVALID_RECEIPT: EbmsError = EbmsError {
    code: "EBMS:0302",
    severity: Severity::Failure,
    short_description: "InvalidReceipt",
    category: Category::Communication,
    description: "A Receipt has been received for a message that was previously sent by the MSH generating this error, but the content does not match the message content (e.g. some part has not been acknowledged, or the digest associated does not match the signature digest, for NRR).",
};

pub const EBMS_DECOMPRESSION_FAILURE: EbmsError = EbmsError {
    code: "EBMS:0303",
    severity: Severity::Failure,
    short_description: "DecompressionFailure",
    category: Category::Communication,
    description: "An error occurred during the decompression.",
};

/// All catalog entries, ordered by code
pub static CATALOG: &[EbmsError] = &[
    EBMS_VALUE_NOT_RECOGNIZED,
    EBMS_FEATURE_NOT_SUPPORTED,
    EBMS_VALUE_INCONSISTENT,
    EBMS_OTHER,
    EBMS_CONNECTION_FAILURE,
    EBMS_EMPTY_MESSAGE_PARTITION_CHANNEL,
    EBMS_MIME_INCONSISTENCY,
    EBMS_FEATURE_NOT_SUPPORTED_INCONSISTENCY,
    EBMS_INVALID_HEADER,
    EBMS_PROCESSING_MODE_MISMATCH,
    EBMS_EXTERNAL_PAYLOAD_ERROR,
    EBMS_FAILED_AUTHENTICATION,
    EBMS_FAILED_DECRYPTION,
    EBMS_POLICY_NONCOMPLIANCE,
    EBMS_DYSFUNCTIONAL_RELIABILITY,
    EBMS_DELIVERY_FAILURE,
    EBMS_MISSING_RECEIPT,
    EBMS_INVALID_RECEIPT,
    EBMS_DECOMPRESSION_FAILURE,
];

/// Find a catalog entry by its wire code (e.g. `EBMS:0009`)
pub fn lookup(code: &str) -> Option<&'static EbmsError> {
    let code = code.trim();
    CATALOG.iter().find(|e| e.code == code)
}

/// Find a catalog entry by its short description (e.g. `InvalidHeader`)
pub fn lookup_short_description(name: &str) -> Option<&'static EbmsError> {
    let name = name.trim();
    CATALOG.iter().find(|e| e.short_description == name)
}
