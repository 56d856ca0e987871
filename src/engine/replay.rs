//! Replay prevention for time-based codes (§4.6).
//!
//! When `DISALLOW_REUSE` is present, its value is a space-separated list of
//! time-counter values that are currently off-limits. Every successful
//! time-based login adds its own counter; entries that have aged out of the
//! accepted window are pruned on the way.

use crate::engine::error::{PamTotpError, Result};
use crate::engine::state::record::StateRecord;

const KEY: &str = "DISALLOW_REUSE";

fn malformed() -> PamTotpError {
    PamTotpError::MalformedOption { key: "DISALLOW_REUSE", reason: "expected a list of integers" }
}

/// Reject `tm` if it is currently blocked, otherwise prune stale entries
/// (those more than `window` steps away from `tm`) and record `tm` as used.
/// A no-op (`Ok(())`, no mutation) when `DISALLOW_REUSE` isn't configured.
pub fn enforce(record: &mut StateRecord, tm: i64, window: i64) -> Result<()> {
    let Some(raw) = record.get(KEY).map(str::to_string) else {
        return Ok(());
    };

    let mut blocked = Vec::new();
    for tok in raw.split_whitespace() {
        blocked.push(tok.parse::<i64>().map_err(|_| malformed())?);
    }

    if blocked.contains(&tm) {
        return Err(PamTotpError::ReplayDetected);
    }

    blocked.retain(|&b| (b - tm).abs() < window);
    blocked.push(tm);

    let value = blocked.iter().map(i64::to_string).collect::<Vec<_>>().join(" ");
    record.set(KEY, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::record::{OptionLine, StateRecord};

    fn record_with(disallow: &str) -> StateRecord {
        StateRecord {
            secret_line: "S".into(),
            options: vec![OptionLine { key: KEY.into(), value: disallow.into() }],
            scratch_codes: vec![],
            trailing: vec![],
        }
    }

    #[test]
    fn not_configured_is_a_noop() {
        let mut record = StateRecord::parse("S\n");
        enforce(&mut record, 100, 3).unwrap();
        assert!(record.get(KEY).is_none());
    }

    #[test]
    fn blocked_timestamp_is_rejected() {
        let mut record = record_with("100");
        let err = enforce(&mut record, 100, 3).unwrap_err();
        assert!(matches!(err, PamTotpError::ReplayDetected));
    }

    #[test]
    fn stale_entries_are_pruned_and_current_recorded() {
        let mut record = record_with("90 99");
        enforce(&mut record, 100, 3).unwrap();
        // 90 is outside window (|90-100|=10 >= 3), 99 stays (|99-100|=1 < 3)
        assert_eq!(record.get(KEY), Some("99 100"));
    }
}
