//! ebMS error taxonomy and signal message construction
//!
//! Pure and stateless apart from the static catalog.

pub mod builder;
pub mod catalog;

pub use builder::{
    build_error, build_pull_request, build_receipt, build_signal_message,
    build_signal_message_with_id, ErrorRecord, ORIGIN_EBMS, ORIGIN_SECURITY,
};
pub use catalog::{
    lookup, Category, EbmsError, Severity, CATALOG, EBMS_CONNECTION_FAILURE,
    EBMS_DECOMPRESSION_FAILURE, EBMS_DELIVERY_FAILURE, EBMS_DYSFUNCTIONAL_RELIABILITY,
    EBMS_EMPTY_MESSAGE_PARTITION_CHANNEL, EBMS_EXTERNAL_PAYLOAD_ERROR, EBMS_FAILED_AUTHENTICATION,
    EBMS_FAILED_DECRYPTION, EBMS_FEATURE_NOT_SUPPORTED, EBMS_FEATURE_NOT_SUPPORTED_INCONSISTENCY,
    EBMS_INVALID_HEADER, EBMS_INVALID_RECEIPT, EBMS_MIME_INCONSISTENCY, EBMS_MISSING_RECEIPT,
    EBMS_OTHER, EBMS_POLICY_NONCOMPLIANCE, EBMS_PROCESSING_MODE_MISMATCH, EBMS_VALUE_INCONSISTENT,
    EBMS_VALUE_NOT_RECOGNIZED,
};
