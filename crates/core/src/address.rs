//! Fragment address codec.
//!
//! Every stored fragment lives under a single key built from three parts:
//!
//! ```text
//! percent(room) / percent(docname) / fragment
//! ```
//!
//! `room` and `docname` are percent-encoded independently so either may contain `/`.
//! The fragment token is backend-assigned (a random UUID v4 by default) and never
//! contains a literal `/`. Encoding with an empty fragment yields the listing prefix
//! for all fragments of a document.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use uuid::Uuid;

use crate::storage::StorageError;

/// Characters left untouched, matching JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Decoded location of a single fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentAddress {
    /// Room namespace.
    pub room: String,
    /// Document name within the room.
    pub docname: String,
    /// Fragment token. Empty for a document prefix.
    pub fragment: String,
}

impl FragmentAddress {
    /// Address a new fragment with a fresh random token.
    #[must_use]
    pub fn new(room: impl Into<String>, docname: impl Into<String>) -> Self {
        Self::with_fragment(room, docname, new_fragment_token())
    }

    /// Address an existing fragment.
    #[must_use]
    pub fn with_fragment(
        room: impl Into<String>,
        docname: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            docname: docname.into(),
            fragment: fragment.into(),
        }
    }

    /// Encode into a storage key.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_key(&self.room, &self.docname, &self.fragment)
    }

    /// Decode a storage key.
    ///
    /// Splits on the last two `/` separators, so only the fragment token is required to
    /// be slash-free.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MalformedKey`] when fewer than two separators are present
    /// or a segment does not decode to UTF-8.
    pub fn decode(key: &str) -> Result<Self, StorageError> {
        let (rest, fragment) = key
            .rsplit_once('/')
            .ok_or_else(|| StorageError::malformed_key(key))?;
        let (room, docname) = rest
            .rsplit_once('/')
            .ok_or_else(|| StorageError::malformed_key(key))?;

        Ok(Self {
            room: decode_component(room, key)?,
            docname: decode_component(docname, key)?,
            fragment: fragment.to_string(),
        })
    }

    /// Whether this address belongs to the given document.
    #[must_use]
    pub fn belongs_to(&self, room: &str, docname: &str) -> bool {
        self.room == room && self.docname == docname
    }
}

impl fmt::Display for FragmentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Encode `(room, docname, fragment)` into a storage key.
#[must_use]
pub fn encode_key(room: &str, docname: &str, fragment: &str) -> String {
    format!(
        "{}/{}/{}",
        encode_component(room),
        encode_component(docname),
        fragment
    )
}

/// Percent-encode one name with the `encodeURIComponent` character set.
#[must_use]
pub fn encode_component(name: &str) -> String {
    utf8_percent_encode(name, COMPONENT).to_string()
}

/// Listing prefix covering every fragment of a document (`room/docname/`).
#[must_use]
pub fn document_prefix(room: &str, docname: &str) -> String {
    encode_key(room, docname, "")
}

/// Generate a fresh fragment token.
#[must_use]
pub fn new_fragment_token() -> String {
    Uuid::new_v4().to_string()
}

fn decode_component(segment: &str, key: &str) -> Result<String, StorageError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| StorageError::malformed_key(key))
}
