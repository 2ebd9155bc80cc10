//! Build-time configuration.
//!
//! Each constant can be overridden through an environment variable while the
//! crate is compiled, e.g. `CHRONON_TICK_PER_SECOND=100`. Values that are not
//! plain decimal integers fall back to the default.

/// OS tick frequency in Hz (`CHRONON_TICK_PER_SECOND`).
pub const TICK_PER_SECOND: u32 = parse_or(option_env!("CHRONON_TICK_PER_SECOND"), 1_000);

/// How many times one timer may re-fire within a single interrupt pass
/// before the rest of its backlog is deferred to the next interrupt
/// (`CHRONON_MAX_REFIRES_PER_PASS`).
pub const MAX_REFIRES_PER_PASS: u32 =
    parse_or(option_env!("CHRONON_MAX_REFIRES_PER_PASS"), 8);

const _: () = assert!(
    TICK_PER_SECOND > 0 && TICK_PER_SECOND <= 1_000_000_000,
    "CHRONON_TICK_PER_SECOND must be between 1 and 1000000000"
);

const fn parse_or(value: Option<&str>, default: u32) -> u32 {
    let Some(value) = value else {
        return default;
    };
    let bytes = value.as_bytes();
    if bytes.is_empty() {
        return default;
    }
    let mut result: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        if !digit.is_ascii_digit() {
            return default;
        }
        result = match result.checked_mul(10) {
            Some(shifted) => match shifted.checked_add((digit - b'0') as u32) {
                Some(sum) => sum,
                None => return default,
            },
            None => return default,
        };
        i += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_overrides() {
        assert_eq!(parse_or(Some("100"), 1_000), 100);
        assert_eq!(parse_or(Some("0"), 8), 0);
        assert_eq!(parse_or(Some("4294967295"), 1), u32::MAX);
    }

    #[test]
    fn falls_back_on_bad_input() {
        assert_eq!(parse_or(None, 1_000), 1_000);
        assert_eq!(parse_or(Some(""), 1_000), 1_000);
        assert_eq!(parse_or(Some("1k"), 1_000), 1_000);
        assert_eq!(parse_or(Some("-5"), 8), 8);
        assert_eq!(parse_or(Some("4294967296"), 8), 8);
    }
}
