//! Parsed, structured view of the state file contents.
//!
//! Rather than scanning a raw byte buffer on every operation (the approach
//! the original C module takes, see SPEC_FULL.md §9), this implementation
//! parses the file once into an ordered record and lets every component
//! mutate that record directly. Serialization re-emits the canonical shape,
//! which is byte-identical to the input for any file that already conforms
//! to the format (the round-trip property required by the spec).

use zeroize::Zeroize;

/// An option line's key and (possibly empty) value, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionLine {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    /// Raw text of line 1 — the BASE32-encoded secret.
    pub secret_line: String,
    /// Option lines, in the order they appear on disk.
    pub options: Vec<OptionLine>,
    /// Scratch codes, in the order they appear on disk.
    pub scratch_codes: Vec<u64>,
    /// Anything left over that the parser could not place (malformed
    /// trailing content). Preserved verbatim so a round-trip still matches
    /// byte-for-byte even for a file with trailing junk.
    pub trailing: Vec<String>,
}

const OPTION_PREFIX: &str = "\" ";

fn split_lines(buf: &str) -> Vec<&str> {
    buf.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

fn is_option_line(line: &str) -> bool {
    line.starts_with('"') && line.as_bytes().get(1) == Some(&b' ')
}

/// Split an option line's payload (everything after the `" ` prefix) into
/// `(key, value)`. `value` is empty for a marker-only key like `TOTP_AUTH`.
fn split_option(payload: &str) -> (String, String) {
    match payload.split_once(|c: char| c == ' ' || c == '\t') {
        Some((key, rest)) => (key.to_string(), rest.trim_start_matches([' ', '\t']).to_string()),
        None => (payload.to_string(), String::new()),
    }
}

impl StateRecord {
    /// Parse the file buffer (as returned by `io::open_and_read`, sans the
    /// appended sentinel NUL) into a structured record.
    pub fn parse(buf: &str) -> StateRecord {
        let lines = split_lines(buf);
        let mut iter = lines.into_iter();

        let secret_line = iter.next().unwrap_or_default().to_string();

        let mut options = Vec::new();
        let mut rest: Vec<&str> = Vec::new();
        let mut in_options = true;
        for line in iter {
            if in_options && is_option_line(line) {
                let (key, value) = split_option(&line[OPTION_PREFIX.len()..]);
                options.push(OptionLine { key, value });
            } else {
                in_options = false;
                rest.push(line);
            }
        }

        let mut scratch_codes = Vec::new();
        let mut trailing = Vec::new();
        let mut rest_iter = rest.into_iter().peekable();
        while let Some(line) = rest_iter.peek().copied() {
            if line.is_empty() || is_option_line(line) {
                rest_iter.next();
                continue;
            }
            match line.parse::<u64>() {
                Ok(v) if v >= 10_000_000 && line.chars().all(|c| c.is_ascii_digit()) => {
                    scratch_codes.push(v);
                    rest_iter.next();
                }
                _ => break,
            }
        }
        for line in rest_iter {
            if !line.is_empty() {
                trailing.push(line.to_string());
            }
        }

        StateRecord { secret_line, options, scratch_codes, trailing }
    }

    /// Re-emit the canonical on-disk shape.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.secret_line);
        out.push('\n');
        for opt in &self.options {
            out.push_str(OPTION_PREFIX);
            out.push_str(&opt.key);
            if !opt.value.is_empty() {
                out.push(' ');
                out.push_str(&opt.value);
            }
            out.push('\n');
        }
        for code in &self.scratch_codes {
            out.push_str(&code.to_string());
            out.push('\n');
        }
        for line in &self.trailing {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.iter().find(|o| o.key == key).map(|o| o.value.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.options.iter().any(|o| o.key == key)
    }

    /// Replace the first matching option in place, or insert a new one
    /// immediately after the secret line. Any later duplicates are removed.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(pos) = self.options.iter().position(|o| o.key == key) {
            self.options[pos].value = value;
            // Drop any later duplicates of this key, keeping only `pos`
            // (the first, now-updated occurrence).
            let mut seen = false;
            self.options.retain(|o| {
                if o.key != key {
                    return true;
                }
                if seen {
                    false
                } else {
                    seen = true;
                    true
                }
            });
        } else {
            self.options.insert(0, OptionLine { key: key.to_string(), value });
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.options.retain(|o| o.key != key);
    }

    /// Remove a scratch code equal to `value`, returning whether it was
    /// present (and thus consumed).
    pub fn consume_scratch(&mut self, value: u64) -> bool {
        if let Some(pos) = self.scratch_codes.iter().position(|&c| c == value) {
            self.scratch_codes.remove(pos);
            true
        } else {
            false
        }
    }
}

/// The full serialized file contents. Zeroized on drop since it contains
/// (or contained) the secret line and other sensitive ledgers.
pub struct SerializedBuffer(pub String);

impl Drop for SerializedBuffer {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}
