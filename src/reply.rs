/// Shared reply-decoding helpers used by the typed command traits in
/// `commands/*`. Centralizing these keeps the ~80 typed operations in §6
/// from each re-deriving "nil bulk means absent" / "integer 0 or 1 means
/// bool" / etc.
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::resp::RespValue;

/// `SimpleString("OK")` -> `()`; anything else is unexpected (server errors
/// are intercepted earlier, in `classify_reply`).
pub fn decode_ok(value: RespValue) -> Result<()> {
    match value {
        RespValue::SimpleString(ref s) if s == "OK" => Ok(()),
        other => Err(Error::unexpected(format!("expected +OK, got {:?}", other))),
    }
}

/// Nil bulk -> `None` (key-missing, §4.4 step 6); non-nil bulk -> `Some`.
pub fn decode_bulk_opt(value: RespValue) -> Result<Option<Bytes>> {
    match value {
        RespValue::BulkString(b) => Ok(b),
        other => Err(Error::unexpected(format!("expected bulk string, got {:?}", other))),
    }
}

/// Same as [`decode_bulk_opt`] but maps the nil case to `Error::KeyNotFound`
/// for call sites that surface absence as an error rather than an `Option`.
pub fn decode_bulk_required(value: RespValue) -> Result<Bytes> {
    decode_bulk_opt(value)?.ok_or(Error::KeyNotFound)
}

pub fn decode_integer(value: RespValue) -> Result<i64> {
    match value {
        RespValue::Integer(n) => Ok(n),
        other => Err(Error::unexpected(format!("expected integer, got {:?}", other))),
    }
}

/// Many Redis commands encode a boolean as `:0`/`:1`.
pub fn decode_bool(value: RespValue) -> Result<bool> {
    Ok(decode_integer(value)? != 0)
}

/// Bulk string holding an ASCII float (e.g. `ZSCORE`, `HINCRBYFLOAT`).
pub fn decode_float(value: RespValue) -> Result<f64> {
    let bytes = decode_bulk_required(value)?;
    std::str::from_utf8(&bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| Error::unexpected("malformed float reply"))
}

/// `MGET`-shaped reply: an array of bulk strings, any of which may be nil.
pub fn decode_bulk_array(value: RespValue) -> Result<Vec<Option<Bytes>>> {
    match value {
        RespValue::Array(Some(items)) => items.into_iter().map(decode_bulk_opt).collect(),
        RespValue::Array(None) => Ok(Vec::new()),
        other => Err(Error::unexpected(format!("expected array, got {:?}", other))),
    }
}

/// An array of bulk strings where every element is expected to be non-nil
/// (e.g. `SMEMBERS`, `LRANGE`).
pub fn decode_bytes_vec(value: RespValue) -> Result<Vec<Bytes>> {
    match value {
        RespValue::Array(Some(items)) => items.into_iter().map(decode_bulk_required).collect(),
        RespValue::Array(None) => Ok(Vec::new()),
        other => Err(Error::unexpected(format!("expected array, got {:?}", other))),
    }
}

/// `ZRANGE ... WITHSCORES`-shaped reply: alternating member/score bulk
/// strings, regrouped into pairs.
pub fn decode_member_score_pairs(value: RespValue) -> Result<Vec<(Bytes, f64)>> {
    let flat = decode_bytes_vec(value)?;
    if flat.len() % 2 != 0 {
        return Err(Error::unexpected("WITHSCORES reply had an odd element count"));
    }
    flat.chunks(2)
        .map(|pair| {
            let member = pair[0].clone();
            let score_str = std::str::from_utf8(&pair[1])
                .map_err(|_| Error::unexpected("non-UTF8 score in WITHSCORES reply"))?;
            let score: f64 = score_str
                .parse()
                .map_err(|_| Error::unexpected("malformed score in WITHSCORES reply"))?;
            Ok((member, score))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ok_accepts_simple_ok() {
        assert!(decode_ok(RespValue::SimpleString("OK".to_string())).is_ok());
    }

    #[test]
    fn decode_bulk_opt_distinguishes_nil_from_empty() {
        assert_eq!(decode_bulk_opt(RespValue::BulkString(None)).unwrap(), None);
        assert_eq!(
            decode_bulk_opt(RespValue::BulkString(Some(Bytes::new()))).unwrap(),
            Some(Bytes::new())
        );
    }

    #[test]
    fn decode_bulk_required_maps_nil_to_key_not_found() {
        let err = decode_bulk_required(RespValue::BulkString(None)).unwrap_err();
        assert!(matches!(err, Error::KeyNotFound));
    }

    #[test]
    fn decode_member_score_pairs_parses_alternating_reply() {
        let value = RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("a"))),
            RespValue::BulkString(Some(Bytes::from("1"))),
            RespValue::BulkString(Some(Bytes::from("b"))),
            RespValue::BulkString(Some(Bytes::from("2"))),
        ]));
        let pairs = decode_member_score_pairs(value).unwrap();
        assert_eq!(pairs, vec![(Bytes::from("a"), 1.0), (Bytes::from("b"), 2.0)]);
    }
}
