//! Wire protocol for the native inference backend's stdout line.
//!
//! Output line shape: `TOKENS|TTFT_MS|TEXT`, both numeric prefixes 1-6
//! ASCII digits. The parser also accepts the older single-prefix form
//! `TOKENS|TEXT`, and on any other shape treats the whole string as TEXT
//! with null timing fields - it never rejects output outright.

/// A parsed native output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    pub tokens: Option<u32>,
    pub ttft_ms: Option<u64>,
    pub text: String,
}

fn is_numeric_prefix(s: &str) -> bool {
    !s.is_empty() && s.len() <= 6 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parses one line of native backend output per the two/one-prefix
/// protocol. Never fails: on any non-conforming shape the entire input
/// is returned verbatim as `text` with both numeric fields `None`.
pub fn parse_native_output(line: &str) -> ParsedOutput {
    let parts: Vec<&str> = line.splitn(3, '|').collect();

    if parts.len() == 3 && is_numeric_prefix(parts[0]) && is_numeric_prefix(parts[1]) {
        return ParsedOutput {
            tokens: parts[0].parse().ok(),
            ttft_ms: parts[1].parse().ok(),
            text: parts[2].to_string(),
        };
    }

    if parts.len() >= 2 && is_numeric_prefix(parts[0]) {
        // single-prefix form TOKENS|TEXT - re-join everything after the
        // first pipe so embedded pipes in TEXT survive.
        let text = line.splitn(2, '|').nth(1).unwrap_or("").to_string();
        return ParsedOutput {
            tokens: parts[0].parse().ok(),
            ttft_ms: None,
            text,
        };
    }

    ParsedOutput {
        tokens: None,
        ttft_ms: None,
        text: line.to_string(),
    }
}
