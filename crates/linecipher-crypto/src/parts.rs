//! Routing attributes carried in handshake headers.

use std::collections::BTreeMap;

use linecipher_proto::Header;

use crate::error::CipherError;

/// Map from cipher suite id to a key fingerprint.
///
/// In a header each entry is a field named by the two-digit lowercase hex
/// csid (`"1a"`) holding the fingerprint string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parts(BTreeMap<u8, String>);

impl Parts {
    /// Empty set of parts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the fingerprint for `csid`.
    pub fn insert(&mut self, csid: u8, fingerprint: impl Into<String>) -> Option<String> {
        self.0.insert(csid, fingerprint.into())
    }

    /// Fingerprint for `csid`.
    pub fn get(&self, csid: u8) -> Option<&str> {
        self.0.get(&csid).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in ascending csid order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.0.iter().map(|(csid, fp)| (*csid, fp.as_str()))
    }

    /// Write every entry into `header` as a hex-named string field.
    pub fn apply_to(&self, header: &mut Header) {
        for (csid, fingerprint) in &self.0 {
            header.set_str(format!("{csid:02x}"), fingerprint.as_str());
        }
    }

    /// Collect the hex-named fields of `header`. Other fields are ignored.
    ///
    /// # Errors
    ///
    /// `InvalidMessage` if a hex-named field does not hold a string.
    pub fn from_header(header: &Header) -> Result<Self, CipherError> {
        let mut parts = Self::new();
        for (name, value) in header {
            let Some(csid) = parse_csid(name) else {
                continue;
            };
            let fingerprint = value.as_str().ok_or(CipherError::InvalidMessage)?;
            parts.0.insert(csid, fingerprint.to_string());
        }
        Ok(parts)
    }
}

impl FromIterator<(u8, String)> for Parts {
    fn from_iter<I: IntoIterator<Item = (u8, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse a two-digit lowercase hex field name.
fn parse_csid(name: &str) -> Option<u8> {
    let is_lower_hex = |b: &u8| b.is_ascii_digit() || (b'a'..=b'f').contains(b);
    if name.len() != 2 || !name.as_bytes().iter().all(is_lower_hex) {
        return None;
    }
    u8::from_str_radix(name, 16).ok()
}
