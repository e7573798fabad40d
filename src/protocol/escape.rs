//! Line protocol escaping.
//!
//! Each syntactic position has its own reserved set. Reserved characters are
//! backslash-escaped, never removed. A literal backslash is doubled so it can
//! never swallow the separator that follows it.
//!
//! Line breaks have no escape sequence in line protocol. Names carrying one
//! are refused before they reach the formatter (see [`has_line_break`]).

/// Measurement names: backslash, comma and space.
pub fn escape_measurement(s: &str) -> String {
    escape_chars(s, &['\\', ',', ' '])
}

/// Tag keys, tag values and field keys: backslash, comma, equals sign and space.
pub fn escape_key(s: &str) -> String {
    escape_chars(s, &['\\', ',', '=', ' '])
}

/// True when `s` cannot appear in a measurement, tag or field key.
pub fn has_line_break(s: &str) -> bool {
    s.contains(['\n', '\r'])
}

/// String field values: quoted, with backslash and double quote escaped.
pub fn quote_string_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn escape_chars(s: &str, reserved: &[char]) -> String {
    if !s.contains(reserved) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if reserved.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_keeps_equals() {
        assert_eq!(escape_measurement("wx data,v2"), "wx\\ data\\,v2");
        assert_eq!(escape_measurement("a=b"), "a=b");
    }

    #[test]
    fn test_key_escapes_equals() {
        assert_eq!(escape_key("site name=x,y"), "site\\ name\\=x\\,y");
        assert_eq!(escape_key("plain"), "plain");
    }

    #[test]
    fn test_backslash_is_doubled() {
        assert_eq!(escape_key("A\\"), "A\\\\");
        assert_eq!(escape_key(r"C:\wx"), r"C:\\wx");
        assert_eq!(escape_measurement(r"wx\"), r"wx\\");
    }

    #[test]
    fn test_line_breaks_detected() {
        assert!(has_line_break("out\nTemp"));
        assert!(has_line_break("out\r"));
        assert!(!has_line_break("outTemp"));
    }

    #[test]
    fn test_string_field_quoting() {
        assert_eq!(quote_string_field(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
    }
}
