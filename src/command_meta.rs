/// Per-command routing metadata: is this command a write (must land on a
/// master, §4.7) or a read (may be served by a replica)?
///
/// Grounded on the teacher's `is_readonly_command` table in
/// `src/modes/redis/mod.rs`, generalized to the fuller command surface in
/// §6. Unknown commands default to write, the conservative choice.
pub fn is_write_command(op: &str) -> bool {
    !matches!(
        op,
        "GET" | "MGET"
            | "STRLEN"
            | "GETRANGE"
            | "EXISTS"
            | "TTL"
            | "PTTL"
            | "TYPE"
            | "SCARD"
            | "SISMEMBER"
            | "SMEMBERS"
            | "SRANDMEMBER"
            | "SINTER"
            | "SUNION"
            | "SDIFF"
            | "LLEN"
            | "LRANGE"
            | "LINDEX"
            | "HGET"
            | "HMGET"
            | "HGETALL"
            | "HKEYS"
            | "HVALS"
            | "HLEN"
            | "HEXISTS"
            | "ZSCORE"
            | "ZRANK"
            | "ZREVRANK"
            | "ZRANGE"
            | "ZREVRANGE"
            | "ZRANGEBYSCORE"
            | "ZCARD"
            | "ZCOUNT"
            | "GEOPOS"
            | "GEODIST"
            | "GEOSEARCH"
            | "PING"
            | "CLUSTER"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_not_writes() {
        assert!(!is_write_command("GET"));
        assert!(!is_write_command("HGETALL"));
    }

    #[test]
    fn writes_are_writes() {
        assert!(is_write_command("SET"));
        assert!(is_write_command("DEL"));
        assert!(is_write_command("LPUSH"));
    }

    #[test]
    fn unknown_commands_default_to_write() {
        assert!(is_write_command("SOME_FUTURE_COMMAND"));
    }
}
