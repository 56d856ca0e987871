//! The decoded shared secret. Owns its bytes and zeroizes them on drop —
//! they must never outlive the verification attempt that decoded them.

use zeroize::Zeroize;

use crate::engine::error::{PamTotpError, Result};

/// Decoded TOTP secret. Never implements `Debug`/`Display` on purpose so it
/// cannot accidentally land in a log line.
pub struct Secret(Vec<u8>);

impl Secret {
    /// Decode the BASE32 text on line 1 of the state file. BASE32 decoding
    /// itself is treated as an external pure function (see spec §1); this
    /// just owns the result and rejects an empty decode.
    pub fn decode(base32_text: &str) -> Result<Self> {
        let bytes = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, base32_text)
            .or_else(|| base32::decode(base32::Alphabet::Rfc4648 { padding: true }, base32_text));
        match bytes {
            Some(b) if !b.is_empty() => Ok(Secret(b)),
            _ => Err(PamTotpError::MalformedOption {
                key: "secret",
                reason: "line 1 is not valid BASE32",
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_unpadded_base32() {
        let secret = Secret::decode("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(secret.as_bytes(), b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn rejects_non_base32() {
        assert!(Secret::decode("not base32 at all!!").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(Secret::decode("").is_err());
    }
}
