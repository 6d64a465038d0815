//! Key to filename mapping for the per-key file store.
//!
//! Keys are percent-encoded into filenames. Every byte except ASCII
//! alphanumerics and `-` is escaped, so `.`/`..` and names beginning with
//! [`HASHED_PREFIX`] can never come out of the encoder. Keys that would
//! produce an overlong or empty name are replaced by a SHA-256 digest.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};

/// Longest key, and longest encoded name, stored without hashing.
pub const MAX_PLAIN_KEY_LENGTH: usize = 200;

/// Prefix of filenames derived from a key digest.
pub const HASHED_PREFIX: &str = "long_";

const FILENAME_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-');

// == Storage Name ==
/// Filename a cache key is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageName {
    /// Reversible percent-encoding of the key
    Encoded(String),
    /// Digest of the key; the entry must carry the original key
    Hashed(String),
}

impl StorageName {
    /// Maps a cache key to its filename.
    pub fn for_key(key: &str) -> Self {
        if key.is_empty() || key.chars().count() > MAX_PLAIN_KEY_LENGTH {
            return StorageName::Hashed(hashed_name(key));
        }
        let encoded = utf8_percent_encode(key, FILENAME_ESCAPES).to_string();
        if encoded.len() > MAX_PLAIN_KEY_LENGTH {
            return StorageName::Hashed(hashed_name(key));
        }
        StorageName::Encoded(encoded)
    }

    /// The filename itself.
    pub fn as_str(&self) -> &str {
        match self {
            StorageName::Encoded(name) | StorageName::Hashed(name) => name,
        }
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, StorageName::Hashed(_))
    }
}

fn hashed_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{HASHED_PREFIX}{}", hex::encode(digest))
}

/// Recovers a key from an encoded filename.
///
/// Returns `None` for hashed names and names that don't decode to UTF-8;
/// those keys can only be recovered from the stored entry.
pub fn decode_name(name: &str) -> Option<String> {
    if name.starts_with(HASHED_PREFIX) {
        return None;
    }
    percent_decode_str(name)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}
