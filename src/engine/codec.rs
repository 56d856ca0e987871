//! HMAC-SHA1 dynamic truncation — RFC 4226 / RFC 6238 code derivation.
//!
//! This is the only place the crate touches the HMAC primitive; everything
//! above it deals in time counters and accepted windows, never in hashes.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

type HmacSha1 = Hmac<Sha1>;

const DIGITS_MOD: u32 = 1_000_000;

/// Compute the 6-digit (mod 1_000_000) code for `secret` at time-step `counter`.
///
/// `secret` is the raw (already BASE32-decoded) key. Any intermediate byte
/// buffers are wrapped in [`Zeroizing`] so they are cleared before the stack
/// frame unwinds.
pub fn code(secret: &[u8], counter: u64) -> u32 {
    let counter_bytes = Zeroizing::new(counter.to_be_bytes());

    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(counter_bytes.as_slice());
    let hash = Zeroizing::new(mac.finalize().into_bytes());

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let truncated = Zeroizing::new([
        hash[offset] & 0x7f,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);
    let value = u32::from_be_bytes(*truncated);
    value % DIGITS_MOD
}
