/// MOVED/ASK redirection parsing (§4.6), grounded on the teacher's
/// Aho-Corasick-based redirect parser in `src/modes/redis/redirect.rs`
/// (itself derived from RCProxy's `protocol/redis/resp.rs`).
use aho_corasick::AhoCorasick;
use lazy_static::lazy_static;

use crate::resp::RespValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Slot ownership permanently changed; the new master should be
    /// recorded for future requests.
    Moved { slot: u16, target: String },
    /// Slot migration is in progress; only this one request should be
    /// retried, via `ASKING` + the original command, against `target`.
    Ask { slot: u16, target: String },
}

const PATTERNS: &[&str] = &["ASK", "MOVED"];

lazy_static! {
    static ref FINDER: AhoCorasick = AhoCorasick::new(PATTERNS).expect("valid redirect patterns");
}

/// Inspect a raw error message (without the leading `-`) for a MOVED/ASK
/// redirection. Returns `None` for any other error, which should then be
/// classified as a normal `Error::RedisError`.
pub fn parse_redirect(message: &str) -> Option<Redirect> {
    let data = message.as_bytes();
    let mat = FINDER.find(data)?;

    if mat.start() != 0 {
        // MOVED/ASK must be the leading token, not merely present anywhere
        // in the message, or an application-level error containing one of
        // these words as a substring would be misread as a redirect.
        return None;
    }
    if mat.end() >= data.len() || data[mat.end()] != b' ' {
        return None;
    }

    let rest = &message[mat.end() + 1..];
    let mut parts = rest.splitn(2, ' ');
    let slot: u16 = parts.next()?.parse().ok()?;
    let target = parts.next()?.trim().to_string();
    if target.is_empty() {
        return None;
    }

    if mat.pattern().as_u32() == 0 {
        Some(Redirect::Ask { slot, target })
    } else {
        Some(Redirect::Moved { slot, target })
    }
}

/// Extract a redirect from a raw RESP reply, if it is a `-`-prefixed error
/// carrying one.
pub fn redirect_in_reply(value: &RespValue) -> Option<Redirect> {
    match value {
        RespValue::Error(message) => parse_redirect(message),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_moved() {
        let redirect = parse_redirect("MOVED 3999 127.0.0.1:6381").unwrap();
        assert_eq!(
            redirect,
            Redirect::Moved { slot: 3999, target: "127.0.0.1:6381".to_string() }
        );
    }

    #[test]
    fn parses_ask() {
        let redirect = parse_redirect("ASK 12345 192.168.1.100:6380").unwrap();
        assert_eq!(
            redirect,
            Redirect::Ask { slot: 12345, target: "192.168.1.100:6380".to_string() }
        );
    }

    #[test]
    fn rejects_non_redirect_errors() {
        assert_eq!(parse_redirect("ERR unknown command"), None);
        assert_eq!(parse_redirect("WRONGTYPE Operation against a key holding the wrong kind of value"), None);
    }

    #[test]
    fn rejects_malformed_redirects() {
        assert_eq!(parse_redirect("MOVED abc 127.0.0.1:6381"), None);
        assert_eq!(parse_redirect("MOVED 3999"), None);
        assert_eq!(parse_redirect("MOVEDNOSPACE 3999 127.0.0.1:6381"), None);
    }

    #[test]
    fn redirect_in_reply_ignores_non_error_values() {
        assert_eq!(redirect_in_reply(&RespValue::Integer(1)), None);
    }
}
