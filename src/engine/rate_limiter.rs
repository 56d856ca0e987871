//! Sliding-window login rate limiting (§4.4).
//!
//! The `RATE_LIMIT` option line, when present, holds `"<attempts> <interval>
//! <ts1> <ts2> ..."`. Every attempt appends `now`, prunes anything outside
//! `[now - interval, now]`, and rewrites the line. If more than `attempts`
//! timestamps remain in the window the attempt is refused, but the pruned
//! and appended list is still persisted first — exactly like the source
//! module, which always marks the file `updated` even on the rejecting path.

use crate::engine::error::{PamTotpError, Result};
use crate::engine::state::record::StateRecord;

const KEY: &str = "RATE_LIMIT";
const MAX_ATTEMPTS: u32 = 100;
const MAX_INTERVAL: u32 = 3600;

struct Parsed {
    attempts: u32,
    interval: u32,
    timestamps: Vec<u64>,
}

fn malformed() -> PamTotpError {
    PamTotpError::MalformedOption { key: "RATE_LIMIT", reason: "expected \"attempts interval [ts...]\"" }
}

fn parse(value: &str) -> Result<Parsed> {
    let mut tokens = value.split_whitespace();
    let attempts: u32 = tokens.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
    let interval: u32 = tokens.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
    if !(1..=MAX_ATTEMPTS).contains(&attempts) || !(1..=MAX_INTERVAL).contains(&interval) {
        return Err(malformed());
    }
    let mut timestamps = Vec::new();
    for tok in tokens {
        timestamps.push(tok.parse::<u64>().map_err(|_| malformed())?);
    }
    Ok(Parsed { attempts, interval, timestamps })
}

/// Enforce the configured rate limit for this attempt, recording `now` in
/// the ledger. Returns `Ok(())` with no changes if `RATE_LIMIT` isn't set.
/// Mutates `record` either way the option is present, even when the
/// attempt is ultimately refused.
pub fn enforce(record: &mut StateRecord, now: u64) -> Result<()> {
    let Some(raw) = record.get(KEY).map(str::to_string) else {
        return Ok(());
    };
    let mut parsed = parse(&raw)?;

    parsed.timestamps.push(now);
    parsed.timestamps.sort_unstable();

    let mut start = 0usize;
    let mut stop: isize = -1;
    let window_start = now.saturating_sub(parsed.interval as u64);
    for (i, &ts) in parsed.timestamps.iter().enumerate() {
        if ts < window_start {
            start = i + 1;
        } else if ts > now {
            break;
        }
        stop = i as isize;
    }

    let in_window = if stop >= start as isize { (stop - start as isize + 1) as u32 } else { 0 };
    let exceeded = in_window > parsed.attempts;
    if exceeded {
        start = (stop - parsed.attempts as isize + 1).max(0) as usize;
    }

    let kept: Vec<u64> = if stop >= 0 {
        parsed.timestamps[start..=stop as usize].to_vec()
    } else {
        Vec::new()
    };

    let mut new_value = format!("{} {}", parsed.attempts, parsed.interval);
    for ts in &kept {
        new_value.push(' ');
        new_value.push_str(&ts.to_string());
    }
    record.set(KEY, new_value);

    if exceeded {
        Err(PamTotpError::RateLimitExceeded)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::record::{OptionLine, StateRecord};

    fn record_with(rate_limit: &str) -> StateRecord {
        StateRecord {
            secret_line: "S".into(),
            options: vec![OptionLine { key: KEY.into(), value: rate_limit.into() }],
            scratch_codes: vec![],
            trailing: vec![],
        }
    }

    #[test]
    fn no_rate_limit_is_a_noop() {
        let mut record = StateRecord::parse("S\n");
        enforce(&mut record, 1000).unwrap();
        assert!(record.get(KEY).is_none());
    }

    #[test]
    fn records_timestamp_under_limit() {
        let mut record = record_with("3 30");
        enforce(&mut record, 1000).unwrap();
        assert_eq!(record.get(KEY), Some("3 30 1000"));
    }

    #[test]
    fn prunes_timestamps_outside_interval() {
        let mut record = record_with("3 30 900 950 990");
        enforce(&mut record, 1000).unwrap();
        // window is [970, 1000]; 900 and 950 drop out, 990 and 1000 remain
        assert_eq!(record.get(KEY), Some("3 30 990 1000"));
    }

    #[test]
    fn exceeding_attempts_is_rejected_but_still_persisted() {
        let mut record = record_with("2 30 990 995");
        let err = enforce(&mut record, 1000).unwrap_err();
        assert!(matches!(err, PamTotpError::RateLimitExceeded));
        // kept only the most recent `attempts` entries
        assert_eq!(record.get(KEY), Some("2 30 995 1000"));
    }

    #[test]
    fn malformed_option_is_configuration_error() {
        let mut record = record_with("not numbers");
        assert!(enforce(&mut record, 1000).is_err());
    }
}
