//! AS4 payload compression
//!
//! Compressed attachments keep their original MIME type in the `MimeType`
//! part property and announce `application/gzip` in `CompressionType`.
//! Inflating stops at a caller-supplied size limit.

use crate::ebms::{
    Attachment, PartInfo, Property, UserMessage, PART_PROPERTY_COMPRESSION_TYPE,
    PART_PROPERTY_MIME_TYPE,
};
use crate::pmode::CompressionMode;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("Attachment '{content_id}' could not be decompressed: {source}")]
    Decompress {
        content_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Attachment '{content_id}' could not be compressed: {source}")]
    Compress {
        content_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Attachment '{content_id}' inflates beyond {limit} bytes")]
    TooLarge { content_id: String, limit: u64 },

    #[error("Unsupported compression type '{0}'")]
    Unsupported(String),
}

/// Default cap on the inflated size of one attachment
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: u64 = 100 * 1024 * 1024;

pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate `data`, or `None` once the output would exceed `limit` bytes
pub fn gunzip(data: &[u8], limit: u64) -> std::io::Result<Option<Vec<u8>>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)?;
    if out.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(out))
}

fn find_part<'a>(user_message: &'a UserMessage, content_id: &str) -> Option<&'a PartInfo> {
    user_message
        .payload_info
        .iter()
        .find(|part| part.content_id() == Some(content_id))
}

/// Gzip every attachment and record the part properties on the message
///
/// Parts without a `PartInfo` are added to the payload info.
pub fn compress_attachments(
    user_message: &mut UserMessage,
    attachments: Vec<Attachment>,
) -> Result<Vec<Attachment>, CompressionError> {
    let mut compressed = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        let data = gzip(&attachment.data).map_err(|source| CompressionError::Compress {
            content_id: attachment.content_id.clone(),
            source,
        })?;

        let href = format!("cid:{}", attachment.content_id);
        let index = match user_message
            .payload_info
            .iter()
            .position(|p| p.href.as_deref() == Some(href.as_str()))
        {
            Some(index) => index,
            None => {
                user_message.payload_info.push(PartInfo {
                    href: Some(href),
                    properties: Vec::new(),
                });
                user_message.payload_info.len() - 1
            }
        };

        let part = &mut user_message.payload_info[index];
        part.properties.retain(|p| {
            p.name != PART_PROPERTY_COMPRESSION_TYPE && p.name != PART_PROPERTY_MIME_TYPE
        });
        part.properties.push(Property::new(
            PART_PROPERTY_COMPRESSION_TYPE,
            CompressionMode::Gzip.mime_type(),
        ));
        part.properties
            .push(Property::new(PART_PROPERTY_MIME_TYPE, attachment.mime_type.clone()));

        compressed.push(Attachment {
            content_id: attachment.content_id,
            mime_type: CompressionMode::Gzip.mime_type().to_string(),
            data,
        });
    }

    Ok(compressed)
}

/// Inflate every attachment whose part declares a compression type
///
/// The attachment's MIME type is restored from the `MimeType` property.
/// An attachment inflating beyond `limit` bytes fails with
/// [`CompressionError::TooLarge`].
pub fn decompress_attachments(
    user_message: &UserMessage,
    attachments: Vec<Attachment>,
    limit: u64,
) -> Result<Vec<Attachment>, CompressionError> {
    attachments
        .into_iter()
        .map(|attachment| {
            let Some(part) = find_part(user_message, &attachment.content_id) else {
                return Ok(attachment);
            };
            let Some(compression) = part.property(PART_PROPERTY_COMPRESSION_TYPE) else {
                return Ok(attachment);
            };
            if compression != CompressionMode::Gzip.mime_type() {
                return Err(CompressionError::Unsupported(compression.to_string()));
            }

            let data = gunzip(&attachment.data, limit)
                .map_err(|source| CompressionError::Decompress {
                    content_id: attachment.content_id.clone(),
                    source,
                })?
                .ok_or_else(|| CompressionError::TooLarge {
                    content_id: attachment.content_id.clone(),
                    limit,
                })?;
            let mime_type = part
                .property(PART_PROPERTY_MIME_TYPE)
                .map(str::to_string)
                .unwrap_or(attachment.mime_type);

            Ok(Attachment {
                content_id: attachment.content_id,
                mime_type,
                data,
            })
        })
        .collect()
}
