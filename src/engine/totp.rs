//! Time-based code verification (§4.8): window search, then a scan for a
//! consistent clock skew when nothing in the accepted window matches.

use crate::engine::codec;
use crate::engine::error::{PamTotpError, Result};
use crate::engine::secret::Secret;
use crate::engine::state::record::StateRecord;

const KEY_WINDOW: &str = "WINDOW_SIZE";
const KEY_SKEW: &str = "TIME_SKEW";
const DEFAULT_WINDOW: i64 = 3;
const SKEW_SEARCH_RANGE: i64 = 25 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// A code in the accepted window matched, at absolute time-counter `tm`.
    Found { tm: i64 },
    /// Nothing in the accepted window matched. `skew_probe` carries a
    /// discovered candidate skew if the wider scan found one.
    NotFound { skew_probe: Option<i64> },
}

/// Resolve `WINDOW_SIZE`, defaulting to 3 and rejecting anything outside
/// `1..=100`.
pub fn window_size(record: &StateRecord) -> Result<i64> {
    match record.get(KEY_WINDOW) {
        None => Ok(DEFAULT_WINDOW),
        Some(raw) => {
            let value: i64 = raw
                .trim()
                .parse()
                .map_err(|_| PamTotpError::MalformedOption { key: "WINDOW_SIZE", reason: "not an integer" })?;
            if !(1..=100).contains(&value) {
                return Err(PamTotpError::MalformedOption {
                    key: "WINDOW_SIZE",
                    reason: "must be between 1 and 100",
                });
            }
            Ok(value)
        }
    }
}

fn persisted_skew(record: &StateRecord) -> i64 {
    record.get(KEY_SKEW).and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// Search the accepted window around `tm_now + skew`, and if nothing
/// matches, scan +/- 25 minutes for a candidate skew. The wide scan never
/// short-circuits: every counter is always evaluated, so a timing
/// difference between "matched early" and "matched late" can't leak which
/// counter was correct.
pub fn verify(secret: &Secret, record: &StateRecord, code: u32, tm_now: i64, no_skew_adj: bool) -> Result<Match> {
    if code >= 1_000_000 {
        return Err(PamTotpError::CodeOutOfRange);
    }

    let skew = persisted_skew(record);
    let window = window_size(record)?;
    let lo = -((window - 1) / 2);
    let hi = window / 2;
    for i in lo..=hi {
        if codec::code(secret.as_bytes(), (tm_now + skew + i) as u64) == code {
            return Ok(Match::Found { tm: tm_now + skew + i });
        }
    }

    if no_skew_adj {
        return Ok(Match::NotFound { skew_probe: None });
    }

    let mut found: Option<i64> = None;
    for i in 0..SKEW_SEARCH_RANGE {
        let matches_negative = codec::code(secret.as_bytes(), (tm_now - i) as u64) == code;
        let matches_positive = codec::code(secret.as_bytes(), (tm_now + i) as u64) == code;
        if matches_negative && found.is_none() {
            found = Some(-i);
        }
        if matches_positive && found.is_none() {
            found = Some(i);
        }
    }

    Ok(Match::NotFound { skew_probe: found })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::record::{OptionLine, StateRecord};

    fn secret() -> Secret {
        Secret::decode("JBSWY3DPEHPK3PXP").unwrap()
    }

    #[test]
    fn default_window_is_three() {
        let record = StateRecord::parse("S\n");
        assert_eq!(window_size(&record).unwrap(), 3);
    }

    #[test]
    fn rejects_window_out_of_range() {
        let record = StateRecord {
            secret_line: "S".into(),
            options: vec![OptionLine { key: KEY_WINDOW.into(), value: "0".into() }],
            scratch_codes: vec![],
            trailing: vec![],
        };
        assert!(window_size(&record).is_err());
    }

    #[test]
    fn spec_scenario_basic_accept_at_exact_counter() {
        let record = StateRecord::parse("JBSWY3DPEHPK3PXP\n\" TOTP_AUTH\n");
        let outcome = verify(&secret(), &record, 81_804, 37_037_036, false).unwrap();
        assert_eq!(outcome, Match::Found { tm: 37_037_036 });
    }

    #[test]
    fn code_out_of_syntactic_range_is_rejected_without_codec_call() {
        let record = StateRecord::parse("JBSWY3DPEHPK3PXP\n\" TOTP_AUTH\n");
        let err = verify(&secret(), &record, 1_000_000, 37_037_036, false).unwrap_err();
        assert!(matches!(err, PamTotpError::CodeOutOfRange));
    }

    #[test]
    fn persisted_skew_shifts_the_accepted_window() {
        let record = StateRecord::parse("JBSWY3DPEHPK3PXP\n\" TOTP_AUTH\n\" TIME_SKEW 2\n");
        // The code valid at counter 37_037_038 is reachable at tm_now =
        // 37_037_036 once the persisted skew of +2 is applied.
        let target = codec::code(secret().as_bytes(), 37_037_038);
        let outcome = verify(&secret(), &record, target, 37_037_036, false).unwrap();
        assert_eq!(outcome, Match::Found { tm: 37_037_038 });
    }

    #[test]
    fn no_skew_adj_suppresses_the_wide_scan() {
        let record = StateRecord::parse("JBSWY3DPEHPK3PXP\n\" TOTP_AUTH\n");
        let target = codec::code(secret().as_bytes(), 37_037_036 + 500);
        let outcome = verify(&secret(), &record, target, 37_037_036, true).unwrap();
        assert_eq!(outcome, Match::NotFound { skew_probe: None });
    }

    #[test]
    fn wide_scan_discovers_skew_outside_window() {
        let record = StateRecord::parse("JBSWY3DPEHPK3PXP\n\" TOTP_AUTH\n");
        let target = codec::code(secret().as_bytes(), 37_037_036 + 500);
        let outcome = verify(&secret(), &record, target, 37_037_036, false).unwrap();
        assert_eq!(outcome, Match::NotFound { skew_probe: Some(500) });
    }
}
