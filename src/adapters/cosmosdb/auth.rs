//! Master-key request signing for the Cosmos DB REST API

use crate::domain::{CosmosDbError, Result};
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent with every request
pub const API_VERSION: &str = "2018-12-31";

/// Resource types used in the signature payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Databases,
    Collections,
    Documents,
    PartitionKeyRanges,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Databases => "dbs",
            ResourceType::Collections => "colls",
            ResourceType::Documents => "docs",
            ResourceType::PartitionKeyRanges => "pkranges",
        }
    }
}

/// Decoded account key, ready to sign requests
///
/// The HMAC state is keyed once and cloned per signature.
#[derive(Clone)]
pub struct MasterKey {
    mac: HmacSha256,
}

impl MasterKey {
    /// Decode a base64 master key
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid base64.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = zeroize::Zeroizing::new(
            general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| {
                    CosmosDbError::AuthenticationFailed(format!(
                        "Account key is not valid base64: {e}"
                    ))
                })?,
        );

        let mac = HmacSha256::new_from_slice(&decoded).map_err(|e| {
            CosmosDbError::AuthenticationFailed(format!("Unusable account key: {e}"))
        })?;

        Ok(Self { mac })
    }

    /// Build the URL-encoded `authorization` header value
    ///
    /// `resource_link` is case sensitive and must not start with a slash;
    /// `date` is the exact `x-ms-date` header value.
    pub fn authorization(
        &self,
        verb: &str,
        resource_type: ResourceType,
        resource_link: &str,
        date: &str,
    ) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.as_str(),
            resource_link,
            date.to_lowercase()
        );

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        let token = format!("type=master&ver=1.0&sig={signature}");
        url::form_urlencoded::byte_serialize(token.as_bytes()).collect()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Current time in the RFC 1123 form expected by `x-ms-date`
pub fn request_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
