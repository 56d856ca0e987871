//! Clock-skew auto-detection (§4.7).
//!
//! If a user repeatedly submits a code that only validates at a fixed,
//! non-zero skew, we remember up to three `(time_counter, skew)` pairs in
//! `RESETTING_TIME_SKEW`. Once three consecutive, consistent entries have
//! accumulated we adopt their average as the new persisted `TIME_SKEW` and
//! clear the ledger.

use crate::engine::error::Result;
use crate::engine::state::record::StateRecord;

const KEY_RESETTING: &str = "RESETTING_TIME_SKEW";
const KEY_SKEW: &str = "TIME_SKEW";
const LEDGER_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkewUpdate {
    /// An identical `(tm, skew)` pair was resubmitted; nothing persisted.
    NoChange,
    /// Recorded but fewer than three consistent entries so far.
    StillAccumulating,
    /// Three consistent entries accumulated; `TIME_SKEW` adopted this value.
    Established(i64),
}

fn parse_ledger(raw: &str) -> Vec<(i64, i64)> {
    let mut out = Vec::new();
    for tok in raw.split_whitespace() {
        let Some(sign_pos) = tok.rfind(['+', '-']) else { continue };
        if sign_pos == 0 {
            continue;
        }
        let (tm_part, skew_part) = tok.split_at(sign_pos);
        if let (Ok(tm), Ok(skew)) = (tm_part.parse::<i64>(), skew_part.parse::<i64>()) {
            out.push((tm, skew));
        }
    }
    out
}

fn serialize_ledger(entries: &[(i64, i64)]) -> String {
    entries
        .iter()
        .map(|(tm, skew)| format!("{tm}{skew:+}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Record a new `(tm, skew)` observation and check whether it completes a
/// consistent run of three.
pub fn reconcile(record: &mut StateRecord, tm: i64, skew: i64) -> Result<SkewUpdate> {
    let mut entries = match record.get(KEY_RESETTING) {
        Some(raw) => parse_ledger(raw),
        None => Vec::new(),
    };

    if let Some(&(last_tm, last_skew)) = entries.last() {
        if tm + skew == last_tm + last_skew {
            return Ok(SkewUpdate::NoChange);
        }
    }

    if entries.len() == LEDGER_LEN {
        entries.remove(0);
    }
    entries.push((tm, skew));

    let mut established = None;
    if entries.len() == LEDGER_LEN {
        let mut last_tm = entries[0].0;
        let mut last_skew = entries[0].1;
        let mut avg_skew = last_skew;
        let mut consistent = true;
        for &(this_tm, this_skew) in &entries[1..] {
            if this_tm <= last_tm || this_tm > last_tm + 2 || (last_skew - skew).abs() > 1 {
                consistent = false;
                break;
            }
            last_tm = this_tm;
            last_skew = this_skew;
            avg_skew += last_skew;
        }
        if consistent {
            established = Some(avg_skew / LEDGER_LEN as i64);
        }
    }

    if let Some(value) = established {
        record.set(KEY_SKEW, value.to_string());
        record.set(KEY_RESETTING, "");
        Ok(SkewUpdate::Established(value))
    } else {
        record.set(KEY_RESETTING, serialize_ledger(&entries));
        Ok(SkewUpdate::StillAccumulating)
    }
}
