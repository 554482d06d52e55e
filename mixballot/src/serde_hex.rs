use crate::Error;
use std::fmt;

/// The canonical wire encoding for byte sequences: `0x`-prefixed lowercase
/// hexadecimal. Ciphertexts, public keys and commitments all travel as this
/// type; an empty byte sequence encodes as `0x`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct HexString(String);

impl HexString {
    pub fn from_bytes(bytes: &[u8]) -> HexString {
        HexString(format!("0x{}", hex::encode(bytes)))
    }

    /// Decode back into bytes. A missing `0x` prefix is tolerated so keys
    /// pasted from other tooling still parse.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let stripped = self.0.strip_prefix("0x").unwrap_or(&self.0);
        Ok(hex::decode(stripped)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HexString {
    fn from(s: &str) -> HexString {
        HexString(s.trim().to_lowercase())
    }
}

impl From<String> for HexString {
    fn from(s: String) -> HexString {
        HexString::from(s.as_str())
    }
}

impl fmt::Display for HexString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
