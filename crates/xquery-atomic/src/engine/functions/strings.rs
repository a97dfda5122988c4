use core::fmt::Write as _;

use itertools::Itertools;
use unicode_normalization::UnicodeNormalization;

use super::common::{
    FnResult, atomized, boolean, char_count, collation_arg, integer, maybe_string, one_double, opt_atomic, opt_string,
    string,
};
use crate::engine::collation::{CODEPOINT_URI, Collation};
use crate::engine::registry::CallCtx;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::lexical::collapse_xml_whitespace;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequenceStream};

/// String value of the first argument, or of the focus when there is none.
fn string_or_focus<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> Result<String, Error> {
    match args.first() {
        Some(seq) => opt_string(ctx, seq, 1),
        None => Ok(ctx.require_focus()?.string_value()),
    }
}

pub(super) fn string_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let item = match args.first() {
        Some(seq) => {
            let mut cursor = seq.cursor();
            let first = cursor.next_item().transpose()?;
            if cursor.next_item().is_some() {
                return Err(ctx.error(ErrorCode::XPTY0004, "fn:string expects at most one item"));
            }
            first
        }
        None => Some(ctx.require_focus()?.clone()),
    };
    Ok(string(item.as_ref().map(XdmItem::string_value).unwrap_or_default()))
}

pub(super) fn concat_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if let Some(v) = opt_atomic(ctx, arg, i + 1)? {
            out.push_str(&v.as_string());
        }
    }
    Ok(string(out))
}

pub(super) fn string_join_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let separator = match args.get(1) {
        Some(sep) => opt_string(ctx, sep, 2)?,
        None => String::new(),
    };
    let joined = atomized(&args[0])?.iter().map(XdmAtomicValue::as_string).join(&separator);
    Ok(string(joined))
}

/// `fn:round` on a double, as used by `fn:substring`.
fn round_position(x: f64) -> f64 {
    (x + 0.5).floor()
}

pub(super) fn substring_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let s = opt_string(ctx, &args[0], 1)?;
    let start = round_position(one_double(ctx, &args[1], 2)?);
    let end = match args.get(2) {
        Some(len) => start + round_position(one_double(ctx, len, 3)?),
        None => f64::INFINITY,
    };
    #[allow(clippy::cast_precision_loss)]
    let out: String = s
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = (*i + 1) as f64;
            p >= start && p < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(string(out))
}

pub(super) fn string_length_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(integer(char_count(&string_or_focus(ctx, args)?)))
}

pub(super) fn normalize_space_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(string(collapse_xml_whitespace(&string_or_focus(ctx, args)?)))
}

pub(super) fn upper_case_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(string(opt_string(ctx, &args[0], 1)?.to_uppercase()))
}

pub(super) fn lower_case_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    Ok(string(opt_string(ctx, &args[0], 1)?.to_lowercase()))
}

pub(super) fn translate_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let s = opt_string(ctx, &args[0], 1)?;
    let map: Vec<char> = opt_string(ctx, &args[1], 2)?.chars().collect();
    let trans: Vec<char> = opt_string(ctx, &args[2], 3)?.chars().collect();
    let out: String = s
        .chars()
        .filter_map(|c| match map.iter().position(|&m| m == c) {
            Some(idx) => trans.get(idx).copied(),
            None => Some(c),
        })
        .collect();
    Ok(string(out))
}

/// Byte range of the first match of `needle` in `haystack` under `collation`.
///
/// Collation keys may differ in length from their source, so for anything but
/// codepoint order the match is located by comparing keys of source slices.
fn collation_find(collation: &dyn Collation, haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if collation.uri() == CODEPOINT_URI {
        return haystack.find(needle).map(|i| (i, i + needle.len()));
    }
    let key = collation.key(needle);
    if key.is_empty() {
        return Some((0, 0));
    }
    let bounds: Vec<usize> = haystack.char_indices().map(|(i, _)| i).chain(core::iter::once(haystack.len())).collect();
    for (n, &start) in bounds.iter().enumerate() {
        if !collation.key(&haystack[start..]).starts_with(&key) {
            continue;
        }
        if let Some(&end) = bounds[n..].iter().find(|&&end| collation.key(&haystack[start..end]) == key) {
            return Some((start, end));
        }
    }
    None
}

struct StringPair {
    s: String,
    sub: String,
    collation: std::sync::Arc<dyn Collation>,
}

fn string_pair<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> Result<StringPair, Error> {
    Ok(StringPair {
        s: opt_string(ctx, &args[0], 1)?,
        sub: opt_string(ctx, &args[1], 2)?,
        collation: collation_arg(ctx, args, 2)?,
    })
}

pub(super) fn contains_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let p = string_pair(ctx, args)?;
    Ok(boolean(p.collation.key(&p.s).contains(&p.collation.key(&p.sub))))
}

pub(super) fn starts_with_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let p = string_pair(ctx, args)?;
    Ok(boolean(p.collation.key(&p.s).starts_with(&p.collation.key(&p.sub))))
}

pub(super) fn ends_with_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let p = string_pair(ctx, args)?;
    Ok(boolean(p.collation.key(&p.s).ends_with(&p.collation.key(&p.sub))))
}

pub(super) fn substring_before_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let p = string_pair(ctx, args)?;
    let out = collation_find(p.collation.as_ref(), &p.s, &p.sub).map_or("", |(start, _)| &p.s[..start]);
    Ok(string(out))
}

pub(super) fn substring_after_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let p = string_pair(ctx, args)?;
    let out = collation_find(p.collation.as_ref(), &p.s, &p.sub).map_or("", |(_, end)| &p.s[end..]);
    Ok(string(out))
}

pub(super) fn compare_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let collation = collation_arg(ctx, args, 2)?;
    let (Some(a), Some(b)) = (maybe_string(ctx, &args[0], 1)?, maybe_string(ctx, &args[1], 2)?) else {
        return Ok(XdmSequenceStream::empty());
    };
    Ok(integer(collation.compare(&a, &b) as i128))
}

pub(super) fn codepoint_equal_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let (Some(a), Some(b)) = (maybe_string(ctx, &args[0], 1)?, maybe_string(ctx, &args[1], 2)?) else {
        return Ok(XdmSequenceStream::empty());
    };
    Ok(boolean(a == b))
}

pub(super) fn string_to_codepoints_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let s = opt_string(ctx, &args[0], 1)?;
    Ok(XdmSequenceStream::from_atomics(s.chars().map(|c| XdmAtomicValue::integer(i128::from(u32::from(c))))))
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
}

pub(super) fn codepoints_to_string_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let mut out = String::new();
    for (i, v) in atomized(&args[0])?.into_iter().enumerate() {
        let XdmAtomicValue::Integer { value, .. } = v else {
            return Err(ctx.error(
                ErrorCode::XPTY0004,
                format!("item {} of type {} is not an xs:integer", i + 1, v.atomic_type()),
            ));
        };
        match u32::try_from(value).ok().and_then(char::from_u32).filter(|&c| is_xml_char(c)) {
            Some(c) => out.push(c),
            None => return Err(ctx.error(ErrorCode::FOCH0001, format!("{value} is not a valid XML character"))),
        }
    }
    Ok(string(out))
}

pub(super) fn normalize_unicode_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let s = opt_string(ctx, &args[0], 1)?;
    let form = match args.get(1) {
        Some(f) => opt_string(ctx, f, 2)?.trim().to_uppercase(),
        None => "NFC".to_string(),
    };
    let out: String = match form.as_str() {
        "" => s,
        "NFC" => s.nfc().collect(),
        "NFD" => s.nfd().collect(),
        "NFKC" => s.nfkc().collect(),
        "NFKD" => s.nfkd().collect(),
        other => {
            return Err(ctx.error(ErrorCode::FOCH0003, format!("unsupported normalization form '{other}'")));
        }
    };
    Ok(string(out))
}

fn percent_encode(s: &str, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(s.len());
    let mut buf = [0u8; 4];
    for c in s.chars() {
        if keep(c) {
            out.push(c);
        } else {
            for b in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{b:02X}");
            }
        }
    }
    out
}

pub(super) fn encode_for_uri_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let s = opt_string(ctx, &args[0], 1)?;
    Ok(string(percent_encode(&s, |c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))))
}

pub(super) fn iri_to_uri_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let s = opt_string(ctx, &args[0], 1)?;
    Ok(string(percent_encode(&s, |c| {
        c.is_ascii_graphic() && !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '\\' | '^' | '`')
    })))
}

pub(super) fn escape_html_uri_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let s = opt_string(ctx, &args[0], 1)?;
    Ok(string(percent_encode(&s, |c| (' '..='~').contains(&c))))
}

pub(super) fn resolve_uri_fn<N: XdmNode>(ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]) -> FnResult<N> {
    let Some(relative) = maybe_string(ctx, &args[0], 1)? else {
        return Ok(XdmSequenceStream::empty());
    };
    if let Ok(absolute) = url::Url::parse(&relative) {
        return Ok(XdmSequenceStream::atomic(XdmAtomicValue::any_uri(absolute.as_str())));
    }
    let base = match args.get(1) {
        Some(b) => opt_string(ctx, b, 2)?,
        None => ctx
            .static_ctx
            .base_uri
            .clone()
            .ok_or_else(|| ctx.error(ErrorCode::FONS0005, "no base URI in the static context"))?,
    };
    let invalid = |e: url::ParseError| ctx.error(ErrorCode::FORG0002, format!("cannot resolve '{relative}': {e}"));
    let resolved = url::Url::parse(&base).and_then(|b| b.join(&relative)).map_err(invalid)?;
    Ok(XdmSequenceStream::atomic(XdmAtomicValue::any_uri(resolved.as_str())))
}
