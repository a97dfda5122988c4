//! Lexical helpers shared by casting, value rendering and the string functions.
use core::str::FromStr;

use rust_decimal::Decimal;

/// XML Schema canonical form of an `xs:double`.
///
/// Values with magnitude in `[1e-6, 1e6)` use plain decimal notation, other
/// finite values use a mantissa with at least one fractional digit and an `E`
/// exponent. The special values render as `INF`, `-INF` and `NaN`.
pub fn format_double(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let abs = v.abs();
    if (1e-6..1e6).contains(&abs) {
        // Display for f64 never uses exponents and prints the shortest round-trip digits.
        format!("{v}")
    } else {
        exponent_form(&format!("{v:e}"))
    }
}

/// Canonical form of an `xs:float`, using the shortest digits that round-trip
/// through `f32`.
pub fn format_float(v: f32) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let abs = v.abs();
    if (1e-6..1e6).contains(&abs) {
        format!("{v}")
    } else {
        exponent_form(&format!("{v:e}"))
    }
}

// "1.5e7" -> "1.5E7", "1e-7" -> "1.0E-7"
fn exponent_form(rust_exp: &str) -> String {
    let (mantissa, exp) = rust_exp.split_once('e').unwrap_or((rust_exp, "0"));
    if mantissa.contains('.') {
        format!("{mantissa}E{exp}")
    } else {
        format!("{mantissa}.0E{exp}")
    }
}

/// Parse the XML Schema lexical space of `xs:double`/`xs:float`.
///
/// Rust's `f64::from_str` also accepts `inf`, `infinity` and `nan` in any case;
/// those are rejected here so only `INF`, `-INF` and `NaN` name specials.
pub fn parse_double(s: &str) -> Option<f64> {
    let t = s.trim_matches(is_xml_whitespace);
    match t {
        "INF" | "+INF" => return Some(f64::INFINITY),
        "-INF" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    if t.is_empty()
        || !t.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        || !t.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    t.parse::<f64>().ok()
}

pub fn parse_float(s: &str) -> Option<f32> {
    let t = s.trim_matches(is_xml_whitespace);
    match t {
        "INF" | "+INF" => return Some(f32::INFINITY),
        "-INF" => return Some(f32::NEG_INFINITY),
        "NaN" => return Some(f32::NAN),
        _ => {}
    }
    parse_double(t).and_then(|_| t.parse::<f32>().ok())
}

/// Parse the lexical space of `xs:decimal`: optional sign, digits with an
/// optional fraction, no exponent.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let t = s.trim_matches(is_xml_whitespace);
    let body = t.strip_prefix(['+', '-']).unwrap_or(t);
    if body.is_empty() || body == "." {
        return None;
    }
    let mut dots = 0;
    for c in body.chars() {
        match c {
            '.' => dots += 1,
            c if c.is_ascii_digit() => {}
            _ => return None,
        }
    }
    if dots > 1 {
        return None;
    }
    let sign = if t.starts_with('-') { "-" } else { "" };
    let body = body.strip_suffix('.').unwrap_or(body);
    let normalized =
        if body.starts_with('.') { format!("{sign}0{body}") } else { format!("{sign}{body}") };
    Decimal::from_str(&normalized).ok()
}

/// Parse the lexical space of `xs:integer`.
pub fn parse_integer(s: &str) -> Option<i128> {
    let t = s.trim_matches(is_xml_whitespace);
    let body = t.strip_prefix(['+', '-']).unwrap_or(t);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    t.parse::<i128>().ok()
}

/// Canonical `xs:decimal` string. Trailing zeros are dropped but at least one
/// fractional digit is kept, so `5` renders as `5.0`.
pub fn format_decimal(d: &Decimal) -> String {
    let mut n = d.normalize();
    if n.scale() == 0 {
        n.rescale(1);
    }
    n.to_string()
}

/// Bring a decimal to the stored form: normalized, with scale of at least one.
pub fn canonical_decimal(d: Decimal) -> Decimal {
    let mut n = d.normalize();
    if n.scale() == 0 {
        n.rescale(1);
    }
    n
}

pub fn parse_boolean(s: &str) -> Option<bool> {
    match s.trim_matches(is_xml_whitespace) {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[inline]
pub fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// `xs:normalizedString` whitespace facet: each tab, newline and carriage return becomes a space.
pub fn replace_xml_whitespace(input: &str) -> String {
    input.chars().map(|ch| if is_xml_whitespace(ch) { ' ' } else { ch }).collect()
}

/// `xs:token` whitespace facet and `fn:normalize-space`.
pub fn collapse_xml_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for word in input.split(is_xml_whitespace).filter(|w| !w.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

pub fn is_valid_language(s: &str) -> bool {
    let mut parts = s.split('-');
    match parts.next() {
        Some(first) if (1..=8).contains(&first.len()) && first.chars().all(|c| c.is_ascii_alphabetic()) => {}
        _ => return false,
    }
    parts.all(|part| (1..=8).contains(&part.len()) && part.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// XML 1.0 (fifth edition) NameStartChar, optionally without the colon.
pub fn is_name_start_char(ch: char, allow_colon: bool) -> bool {
    matches!(ch,
        'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
        || (allow_colon && ch == ':')
}

pub fn is_name_char(ch: char, allow_colon: bool) -> bool {
    is_name_start_char(ch, allow_colon)
        || matches!(ch, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

pub fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| is_name_start_char(c, false)) && chars.all(|c| is_name_char(c, false))
}

pub fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| is_name_start_char(c, true)) && chars.all(|c| is_name_char(c, true))
}

pub fn is_nmtoken(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| is_name_char(c, true))
}

/// Split a lexical QName into `(prefix, local)`, validating both parts.
pub fn split_qname(s: &str) -> Option<(Option<&str>, &str)> {
    match s.split_once(':') {
        Some((p, l)) if is_ncname(p) && is_ncname(l) => Some((Some(p), l)),
        Some(_) => None,
        None if is_ncname(s) => Some((None, s)),
        None => None,
    }
}

pub fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if !input.len().is_multiple_of(2) {
        return None;
    }
    let mut bytes = Vec::with_capacity(input.len() / 2);
    let mut chars = input.chars();
    while let (Some(high), Some(low)) = (chars.next(), chars.next()) {
        let byte = (high.to_digit(16)? << 4) | low.to_digit(16)?;
        bytes.push(u8::try_from(byte).ok()?);
    }
    Some(bytes)
}

pub fn encode_hex_upper(bytes: &[u8]) -> String {
    use core::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1.0, "1")]
    #[case(1.5, "1.5")]
    #[case(-0.25, "-0.25")]
    #[case(123_456.5, "123456.5")]
    #[case(1e6, "1.0E6")]
    #[case(1.5e7, "1.5E7")]
    #[case(1e-7, "1.0E-7")]
    #[case(0.000_001, "0.000001")]
    #[case(f64::INFINITY, "INF")]
    #[case(f64::NEG_INFINITY, "-INF")]
    #[case(f64::NAN, "NaN")]
    #[case(-0.0, "-0")]
    fn double_canonical(#[case] v: f64, #[case] expected: &str) {
        assert_eq!(format_double(v), expected);
    }

    #[test]
    fn float_uses_shortest_f32_digits() {
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(3.4e38), "3.4E38");
    }

    #[rstest]
    #[case("inf")]
    #[case("Infinity")]
    #[case("nan")]
    #[case("")]
    #[case("1.0.0x")]
    fn double_rejects_non_xsd_forms(#[case] s: &str) {
        assert!(parse_double(s).is_none());
    }

    #[rstest]
    #[case("5", "5.0")]
    #[case("2.50", "2.5")]
    #[case("-.5", "-0.5")]
    #[case("0", "0.0")]
    fn decimal_keeps_one_fraction_digit(#[case] input: &str, #[case] expected: &str) {
        let d = parse_decimal(input).unwrap();
        assert_eq!(format_decimal(&d), expected);
    }

    #[test]
    fn decimal_rejects_exponent() {
        assert!(parse_decimal("1e3").is_none());
        assert!(parse_decimal(".").is_none());
    }

    #[test]
    fn whitespace_facets() {
        assert_eq!(replace_xml_whitespace("a\tb\nc"), "a b c");
        assert_eq!(collapse_xml_whitespace("  a \t\n b  "), "a b");
    }

    #[test]
    fn names() {
        assert!(is_ncname("élan"));
        assert!(!is_ncname("a:b"));
        assert!(is_name("a:b"));
        assert!(is_nmtoken("-12"));
        assert!(!is_ncname("1a"));
        assert_eq!(split_qname("p:l"), Some((Some("p"), "l")));
        assert_eq!(split_qname("p:"), None);
        assert!(is_valid_language("en-US"));
        assert!(!is_valid_language("toolongtag"));
    }

    #[test]
    fn hex_round_trip() {
        assert_eq!(decode_hex("0aFF"), Some(vec![0x0a, 0xff]));
        assert_eq!(encode_hex_upper(&[0x0a, 0xff]), "0AFF");
        assert_eq!(decode_hex("abc"), None);
    }
}
