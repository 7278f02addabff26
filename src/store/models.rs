// OpenNotes Keystore: Key record models
//
// SECURITY: The `private_key` field is intentionally private. It is never
// included in Debug output, log messages, or serialized summaries.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::keys::{PrivateKeyHandle, PublicKeyHandle};

use super::StoreError;

/// Store-assigned record identifier.
pub type KeyId = i64;

/// The persisted unit: one key pair plus its exported public key.
pub struct KeyRecord {
    pub id: KeyId,
    pub name: String,
    pub public_key: PublicKeyHandle,
    /// Opaque private key, never exported.
    private_key: PrivateKeyHandle,
    /// SPKI DER of `public_key`, stored so listing never re-derives it.
    pub public_key_encoding: Vec<u8>,
}

impl KeyRecord {
    pub(crate) fn new(
        id: KeyId,
        name: String,
        public_key: PublicKeyHandle,
        private_key: PrivateKeyHandle,
        public_key_encoding: Vec<u8>,
    ) -> Self {
        Self {
            id,
            name,
            public_key,
            private_key,
            public_key_encoding,
        }
    }

    pub fn private_key(&self) -> &PrivateKeyHandle {
        &self.private_key
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key_encoding)
    }

    /// The public-facing subset handed to listing collaborators.
    pub fn summary(&self) -> KeySummary {
        KeySummary {
            id: self.id,
            name: self.name.clone(),
            public_key_encoding: self.public_key_encoding.clone(),
        }
    }
}

/// Custom Debug implementation that NEVER reveals the private key.
impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .field("public_key_encoding", &hex::encode(&self.public_key_encoding))
            .finish()
    }
}

impl fmt::Display for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.id, self.name, self.fingerprint())
    }
}

/// SHA-256 of an SPKI encoding, lowercase hex.
pub fn fingerprint(spki: &[u8]) -> String {
    hex::encode(Sha256::digest(spki))
}

/// One element of `list_keys`: the primary key and the record it addresses.
#[derive(Debug)]
pub struct KeyEntry {
    pub id: KeyId,
    pub value: KeyRecord,
}

/// A lightweight, shareable view of a key. Never contains private material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySummary {
    pub id: KeyId,
    pub name: String,
    pub public_key_encoding: Vec<u8>,
}

impl KeySummary {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key_encoding)
    }

    /// File name offered when the public key is downloaded.
    pub fn download_file_name(&self) -> String {
        format!("{}.publicKey", self.name)
    }

    /// The SPKI bytes as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!(
            "data:application/octet-stream;base64,{}",
            BASE64.encode(&self.public_key_encoding)
        )
    }
}

impl fmt::Display for KeySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.id, self.name, self.fingerprint())
    }
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

/// Property a single-key lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupCriterion {
    Id,
    Name,
    PublicKeyEncoding,
}

impl FromStr for LookupCriterion {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "publicKeyEncoding" | "spki" => Ok(Self::PublicKeyEncoding),
            other => Err(StoreError::InvalidCriterion(other.to_string())),
        }
    }
}

impl fmt::Display for LookupCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::PublicKeyEncoding => "publicKeyEncoding",
        })
    }
}

/// A typed single-key lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyQuery {
    Id(KeyId),
    Name(String),
    PublicKeyEncoding(Vec<u8>),
}

impl KeyQuery {
    /// Build a query from a criterion name and a textual value. Ids are
    /// decimal; encodings are hex. Fails before any storage is touched.
    pub fn parse(criterion: &str, value: &str) -> Result<Self, StoreError> {
        let invalid = |criterion: LookupCriterion, reason: String| StoreError::InvalidLookupValue {
            criterion: criterion.to_string(),
            reason,
        };

        match criterion.parse::<LookupCriterion>()? {
            LookupCriterion::Id => value
                .trim()
                .parse::<KeyId>()
                .map(Self::Id)
                .map_err(|e| invalid(LookupCriterion::Id, e.to_string())),
            LookupCriterion::Name => Ok(Self::Name(value.to_string())),
            LookupCriterion::PublicKeyEncoding => hex::decode(value.trim())
                .map(Self::PublicKeyEncoding)
                .map_err(|e| invalid(LookupCriterion::PublicKeyEncoding, e.to_string())),
        }
    }

    pub fn criterion(&self) -> LookupCriterion {
        match self {
            Self::Id(_) => LookupCriterion::Id,
            Self::Name(_) => LookupCriterion::Name,
            Self::PublicKeyEncoding(_) => LookupCriterion::PublicKeyEncoding,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroizing;

    fn record() -> KeyRecord {
        KeyRecord::new(
            7,
            "laptop".to_string(),
            PublicKeyHandle::new(vec![1, 2, 3]),
            PrivateKeyHandle::new(Zeroizing::new(b"very-private-bytes".to_vec())),
            b"spki-bytes".to_vec(),
        )
    }

    #[test]
    fn test_record_debug_redacts_private_key() {
        let debug_output = format!("{:?}", record());
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output must contain [REDACTED]"
        );
        assert!(
            !debug_output.contains(&hex::encode(b"very-private-bytes")),
            "Debug output must NEVER contain the private key"
        );
    }

    #[test]
    fn test_record_display_shows_name_and_fingerprint() {
        let record = record();
        let display_output = format!("{}", record);
        assert!(display_output.contains("laptop"));
        assert!(display_output.contains(&record.fingerprint()));
        assert!(display_output.starts_with("[7]"));
    }

    #[test]
    fn test_summary_has_no_private_field() {
        let summary = record().summary();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("private"), "Summary JSON must not contain private material");
        assert_eq!(summary.id, 7);
        assert_eq!(summary.public_key_encoding, b"spki-bytes".to_vec());
    }

    #[test]
    fn test_summary_download_helpers() {
        let summary = record().summary();
        assert_eq!(summary.download_file_name(), "laptop.publicKey");
        assert_eq!(
            summary.data_url(),
            format!("data:application/octet-stream;base64,{}", BASE64.encode(b"spki-bytes"))
        );
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint(b"abc");
        assert_eq!(
            fp,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_criterion_parsing() {
        assert_eq!("id".parse::<LookupCriterion>().unwrap(), LookupCriterion::Id);
        assert_eq!("name".parse::<LookupCriterion>().unwrap(), LookupCriterion::Name);
        assert_eq!(
            "publicKeyEncoding".parse::<LookupCriterion>().unwrap(),
            LookupCriterion::PublicKeyEncoding
        );
        assert_eq!(
            "spki".parse::<LookupCriterion>().unwrap(),
            LookupCriterion::PublicKeyEncoding
        );
        assert!(matches!(
            "bogus".parse::<LookupCriterion>(),
            Err(StoreError::InvalidCriterion(c)) if c == "bogus"
        ));
    }

    #[test]
    fn test_query_parse_values() {
        assert_eq!(KeyQuery::parse("id", "42").unwrap(), KeyQuery::Id(42));
        assert_eq!(
            KeyQuery::parse("name", "n1").unwrap(),
            KeyQuery::Name("n1".to_string())
        );
        assert_eq!(
            KeyQuery::parse("spki", "00ff").unwrap(),
            KeyQuery::PublicKeyEncoding(vec![0x00, 0xff])
        );
        assert!(matches!(
            KeyQuery::parse("id", "forty-two"),
            Err(StoreError::InvalidLookupValue { .. })
        ));
        assert!(matches!(
            KeyQuery::parse("publicKeyEncoding", "zz"),
            Err(StoreError::InvalidLookupValue { .. })
        ));
    }
}
