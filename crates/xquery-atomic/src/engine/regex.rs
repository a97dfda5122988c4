//! XML Schema regular expressions on top of `fancy-regex`.
//!
//! Patterns are translated before compilation: the name-character escapes
//! `\i`, `\I`, `\c` and `\C` become explicit classes, class subtraction
//! `[a-z-[aeiou]]` becomes `[a-z--[aeiou]]`, and under the `x` flag bare
//! whitespace outside classes is dropped. Compiled patterns are shared through
//! a bounded LRU cache keyed by `(pattern, flags)`.
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use smallvec::SmallVec;

use crate::engine::runtime::{Error, ErrorCode};

const NAME_START: &str = r"\p{L}_:";
const NAME_CHAR: &str = r"\p{L}\p{Nd}\p{Mn}\p{Mc}._:\-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegexFlags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_all: bool,
    pub extended: bool,
}

impl RegexFlags {
    /// Parse a flags string. Unknown characters are `err:FORX0001`.
    pub fn parse(flags: &str) -> Result<Self, Error> {
        let mut out = Self::default();
        for ch in flags.chars() {
            match ch {
                'i' => out.case_insensitive = true,
                'm' => out.multi_line = true,
                's' => out.dot_all = true,
                'x' => out.extended = true,
                other => {
                    return Err(Error::from_code(ErrorCode::FORX0001, format!("unsupported regex flag: {other}")));
                }
            }
        }
        Ok(out)
    }
}

fn is_xml_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

/// Rewrite an XML Schema pattern into `fancy-regex` syntax.
pub fn translate_pattern(pattern: &str, flags: RegexFlags) -> Result<String, Error> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut class_depth = 0usize;
    let mut chars = pattern.chars().peekable();
    let mut class_has_item = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let Some(esc) = chars.next() else {
                    return Err(Error::from_code(ErrorCode::FORX0002, "pattern ends with a lone backslash"));
                };
                let in_class = class_depth > 0;
                match (esc, in_class) {
                    ('i', false) => out.push_str(&format!("[{NAME_START}]")),
                    ('I', false) => out.push_str(&format!("[^{NAME_START}]")),
                    ('c', false) => out.push_str(&format!("[{NAME_CHAR}]")),
                    ('C', false) => out.push_str(&format!("[^{NAME_CHAR}]")),
                    ('i', true) => out.push_str(NAME_START),
                    ('c', true) => out.push_str(NAME_CHAR),
                    ('I' | 'C', true) => {
                        return Err(Error::from_code(
                            ErrorCode::FORX0002,
                            format!("\\{esc} is not supported inside a character class"),
                        ));
                    }
                    _ => {
                        out.push('\\');
                        out.push(esc);
                    }
                }
                class_has_item = true;
            }
            '[' => {
                class_depth += 1;
                class_has_item = false;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                class_has_item = true;
                out.push(']');
            }
            '-' if class_depth > 0 && class_has_item && chars.peek() == Some(&'[') => {
                out.push_str("--");
            }
            c if flags.extended && class_depth == 0 && is_xml_space(c) => {}
            c => {
                class_has_item = class_depth > 0;
                out.push(c);
            }
        }
    }
    if class_depth > 0 {
        return Err(Error::from_code(ErrorCode::FORX0002, format!("unterminated character class in '{pattern}'")));
    }
    Ok(out)
}

/// A compiled pattern plus the flags it was compiled with.
#[derive(Debug)]
pub struct CompiledRegex {
    regex: fancy_regex::Regex,
    pattern: String,
    flags: RegexFlags,
}

fn eval_error(e: fancy_regex::Error) -> Error {
    Error::from_code(ErrorCode::FORX0002, format!("regex evaluation error: {e}"))
        .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
}

impl CompiledRegex {
    pub fn compile(pattern: &str, flags: &str) -> Result<Self, Error> {
        let parsed = RegexFlags::parse(flags)?;
        let translated = translate_pattern(pattern, parsed)?;
        let regex = fancy_regex::RegexBuilder::new(&translated)
            .case_insensitive(parsed.case_insensitive)
            .multi_line(parsed.multi_line)
            .dot_matches_new_line(parsed.dot_all)
            .build()
            .map_err(|e| {
                Error::from_code(ErrorCode::FORX0002, format!("invalid regular expression '{pattern}': {e}"))
                    .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
            })?;
        tracing::debug!(pattern, flags, "compiled regex");
        Ok(Self { regex, pattern: pattern.to_string(), flags: parsed })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> RegexFlags {
        self.flags
    }

    /// Number of capturing groups, excluding the whole match.
    pub fn group_count(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }

    pub fn is_match(&self, text: &str) -> Result<bool, Error> {
        self.regex.is_match(text).map_err(eval_error)
    }

    /// Whether the pattern accepts the zero-length string.
    pub fn matches_empty(&self) -> Result<bool, Error> {
        self.is_match("")
    }

    fn reject_empty_match(&self, function: &str) -> Result<(), Error> {
        if self.matches_empty()? {
            return Err(Error::from_code(
                ErrorCode::FORX0003,
                format!("pattern '{}' matches a zero-length string in {function}", self.pattern),
            ));
        }
        Ok(())
    }

    /// `fn:replace` over every non-overlapping match.
    pub fn replace(&self, text: &str, template: &ReplacementTemplate) -> Result<String, Error> {
        self.reject_empty_match("fn:replace")?;
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.regex.captures_iter(text) {
            let caps = caps.map_err(eval_error)?;
            let Some(m) = caps.get(0) else {
                continue;
            };
            out.push_str(&text[last..m.start()]);
            template.expand(&caps, &mut out);
            last = m.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    /// `fn:tokenize`: the substrings between matches. An empty input yields
    /// no tokens.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>, Error> {
        self.reject_empty_match("fn:tokenize")?;
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let mut tokens = Vec::new();
        let mut last = 0;
        for m in self.regex.find_iter(text) {
            let m = m.map_err(eval_error)?;
            tokens.push(text[last..m.start()].to_string());
            last = m.end();
        }
        tokens.push(text[last..].to_string());
        Ok(tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Group(usize),
}

/// Parsed `fn:replace` replacement string.
///
/// `$N` refers to group N (`$0` is the whole match); `\$` and `\\` are
/// literal. A multi-digit reference takes further digits only while the
/// number stays within the group count. References to absent groups expand to
/// the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementTemplate {
    parts: SmallVec<[TemplatePart; 4]>,
}

impl ReplacementTemplate {
    pub fn parse(template: &str, group_count: usize) -> Result<Self, Error> {
        let invalid = |msg: &str| Error::from_code(ErrorCode::FORX0004, format!("{msg} in replacement '{template}'"));
        let mut parts: SmallVec<[TemplatePart; 4]> = SmallVec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some(c @ ('\\' | '$')) => literal.push(c),
                    _ => return Err(invalid("'\\' must be followed by '\\' or '$'")),
                },
                '$' => {
                    let Some(first) = chars.next().and_then(|c| c.to_digit(10)) else {
                        return Err(invalid("'$' must be followed by a digit"));
                    };
                    let mut group = first as usize;
                    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                        let next = group * 10 + d as usize;
                        if next > group_count {
                            break;
                        }
                        group = next;
                        chars.next();
                    }
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(core::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Group(group));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(Self { parts })
    }

    fn expand(&self, caps: &fancy_regex::Captures<'_>, out: &mut String) {
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => out.push_str(s),
                TemplatePart::Group(n) => {
                    if let Some(m) = caps.get(*n) {
                        out.push_str(m.as_str());
                    }
                }
            }
        }
    }
}

/// Bounded cache of compiled patterns.
pub struct RegexCache {
    inner: Mutex<LruCache<(String, String), Arc<CompiledRegex>>>,
}

impl RegexCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get_or_compile(&self, pattern: &str, flags: &str) -> Result<Arc<CompiledRegex>, Error> {
        let key = (pattern.to_string(), flags.to_string());
        if let Some(hit) = self.inner.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(Arc::clone(hit));
        }
        let compiled = Arc::new(CompiledRegex::compile(pattern, flags)?);
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).put(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
