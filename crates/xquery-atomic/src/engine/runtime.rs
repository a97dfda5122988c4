use crate::engine::collation::{CODEPOINT_URI, Collation, CollationRegistry};
use crate::engine::regex::RegexCache;
use crate::xdm::compare::CompareContext;
use crate::xdm::temporal::TemporalError;
use crate::xdm::{CastContext, ExpandedName, XdmItem};
use chrono::{DateTime, FixedOffset, Local, Offset};
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

/// Document source consulted by `fn:doc` and `fn:doc-available`.
pub trait NodeResolver<N>: Send + Sync {
    /// `Ok(None)` when no document exists at `uri`.
    fn doc_node(&self, _uri: &str) -> Result<Option<N>, Error> {
        Ok(None)
    }
}

/// Error codes emitted by this crate, all in the `xqt-errors` namespace except
/// the project-specific `XQRT0001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOAR0001, // division by zero
    FOAR0002, // numeric overflow/underflow
    FOCA0001, // input value too large for decimal
    FOCA0002, // invalid lexical value
    FOCA0003, // input value too large for integer
    FOCH0001, // codepoint not valid
    FOCH0002, // unsupported collation
    FOCH0003, // unsupported normalization form
    FODC0002, // error retrieving resource
    FODC0005, // invalid argument to fn:doc
    FODT0001, // overflow in date/time arithmetic
    FODT0002, // overflow in duration arithmetic
    FODT0003, // invalid timezone value
    FOER0000, // unidentified error
    FONS0004, // no namespace found for prefix
    FONS0005, // base URI not defined in the static context
    FORG0001, // invalid value for cast/constructor
    FORG0002, // invalid argument to fn:resolve-uri
    FORG0003, // zero-or-one called with more than one item
    FORG0004, // one-or-more called with the empty sequence
    FORG0005, // exactly-one called with other than one item
    FORG0006, // invalid argument type
    FORG0008, // both arguments to fn:dateTime have a specified timezone
    FORX0001, // invalid regular expression flags
    FORX0002, // invalid regular expression
    FORX0003, // regular expression matches zero-length string
    FORX0004, // invalid replacement string
    XPTY0004, // type error
    XPDY0002, // context item undefined
    XPST0017, // unknown function or arity
    XQRT0001, // project specific: call depth limit exceeded
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            FOAR0001 => "FOAR0001",
            FOAR0002 => "FOAR0002",
            FOCA0001 => "FOCA0001",
            FOCA0002 => "FOCA0002",
            FOCA0003 => "FOCA0003",
            FOCH0001 => "FOCH0001",
            FOCH0002 => "FOCH0002",
            FOCH0003 => "FOCH0003",
            FODC0002 => "FODC0002",
            FODC0005 => "FODC0005",
            FODT0001 => "FODT0001",
            FODT0002 => "FODT0002",
            FODT0003 => "FODT0003",
            FOER0000 => "FOER0000",
            FONS0004 => "FONS0004",
            FONS0005 => "FONS0005",
            FORG0001 => "FORG0001",
            FORG0002 => "FORG0002",
            FORG0003 => "FORG0003",
            FORG0004 => "FORG0004",
            FORG0005 => "FORG0005",
            FORG0006 => "FORG0006",
            FORG0008 => "FORG0008",
            FORX0001 => "FORX0001",
            FORX0002 => "FORX0002",
            FORX0003 => "FORX0003",
            FORX0004 => "FORX0004",
            XPTY0004 => "XPTY0004",
            XPDY0002 => "XPDY0002",
            XPST0017 => "XPST0017",
            XQRT0001 => "XQRT0001",
            Unknown => "UNKNOWN",
        }
    }

    /// The code as an expanded QName in the error namespace.
    pub fn qname(&self) -> ExpandedName {
        ExpandedName { ns_uri: Some(ERR_NS.to_string()), local: self.as_str().to_string() }
    }

    /// Parse `err:LOCAL`; anything unrecognised is `Unknown`.
    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        const ALL: [ErrorCode; 31] = [
            FOAR0001, FOAR0002, FOCA0001, FOCA0002, FOCA0003, FOCH0001, FOCH0002, FOCH0003, FODC0002,
            FODC0005, FODT0001, FODT0002, FODT0003, FOER0000, FONS0004, FONS0005, FORG0001, FORG0002,
            FORG0003, FORG0004, FORG0005, FORG0006, FORG0008, FORX0001, FORX0002, FORX0003, FORX0004, XPTY0004,
            XPDY0002, XPST0017, XQRT0001,
        ];
        let Some(local) = s.strip_prefix("err:") else {
            return Unknown;
        };
        ALL.into_iter().find(|c| c.as_str() == local).unwrap_or(Unknown)
    }
}

/// Namespace URI used for W3C-defined XPath/XQuery error codes (xqt-errors).
pub use crate::consts::ERR_NS;

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    /// Where the error was raised, typically `fn:name#arity`.
    pub location: Option<String>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), location: None, source: None }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&format!("err:{}", self.code.local))
        } else {
            ErrorCode::Unknown
        }
    }

    /// `err:LOCAL` for standard codes, `Q{ns}local` otherwise.
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else if let Some(ns) = &self.code.ns_uri {
            format!("Q{{{}}}{}", ns, self.code.local)
        } else {
            self.code.local.clone()
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Compose an error with a source cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>) -> Self {
        self.source = source.into();
        self
    }

    /// Parse `err:LOCAL`, `Q{ns}local` or a bare local name.
    pub fn parse_code(s: &str) -> ExpandedName {
        if let Some(rest) = s.strip_prefix("err:") {
            return ExpandedName { ns_uri: Some(ERR_NS.to_string()), local: rest.to_string() };
        }
        if let Some((ns, local)) = s.strip_prefix("Q{").and_then(|t| t.split_once('}')) {
            return ExpandedName { ns_uri: Some(ns.to_string()), local: local.to_string() };
        }
        ExpandedName { ns_uri: None, local: s.to_string() }
    }
}

impl From<fancy_regex::Error> for Error {
    fn from(e: fancy_regex::Error) -> Self {
        Error::from_code(ErrorCode::FORX0002, format!("invalid regular expression: {e}"))
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl From<TemporalError> for Error {
    fn from(e: TemporalError) -> Self {
        let code = match e {
            TemporalError::Lexical { .. } => ErrorCode::FORG0001,
            TemporalError::Timezone(_) => ErrorCode::FODT0003,
            TemporalError::Overflow => ErrorCode::FODT0001,
            TemporalError::DurationOverflow => ErrorCode::FODT0002,
        };
        let message = e.to_string();
        Error::from_code(code, message).with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "error: {} ({}) at {}", self.message, self.format_code(), loc),
            None => write!(f, "error: {} ({})", self.message, self.format_code()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct StaticContext {
    pub base_uri: Option<String>,
    pub default_function_namespace: Option<String>,
    pub default_collation: Option<String>,
    pub namespaces: NamespaceBindings,
}

impl Default for StaticContext {
    fn default() -> Self {
        let mut ns = NamespaceBindings::default();
        ns.by_prefix.insert("xml".to_string(), crate::consts::XML_URI.to_string());
        ns.by_prefix.insert("xs".to_string(), crate::consts::XS.to_string());
        ns.by_prefix.insert("fn".to_string(), crate::consts::FNS.to_string());
        ns.by_prefix.insert("math".to_string(), crate::consts::MATH_NS.to_string());
        ns.by_prefix.insert("err".to_string(), ERR_NS.to_string());
        Self {
            base_uri: None,
            default_function_namespace: Some(crate::consts::FNS.to_string()),
            default_collation: Some(CODEPOINT_URI.to_string()),
            namespaces: ns,
        }
    }
}

impl StaticContext {
    /// Cast environment for static-context-dependent casts (`xs:QName`).
    pub fn cast_context(&self, strict: bool) -> CastContext<'_> {
        CastContext::new(strict, Some(&self.namespaces.by_prefix))
    }
}

/// Builder for `StaticContext`. The `xml` binding is fixed.
pub struct StaticContextBuilder {
    ctx: StaticContext,
}

impl Default for StaticContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticContextBuilder {
    pub fn new() -> Self {
        Self { ctx: StaticContext::default() }
    }

    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.ctx.base_uri = Some(uri.into());
        self
    }

    pub fn with_default_function_namespace(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_function_namespace = Some(uri.into());
        self
    }

    pub fn with_default_collation(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_collation = Some(uri.into());
        self
    }

    /// Register a namespace prefix → URI mapping. Attempts to override the
    /// reserved `xml` prefix are ignored.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let p = prefix.into();
        if p == "xml" {
            return self;
        }
        self.ctx.namespaces.by_prefix.insert(p, uri.into());
        self
    }

    pub fn build(self) -> StaticContext {
        self.ctx
    }
}

pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;
pub const DEFAULT_REGEX_CACHE_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct DynamicContext<N> {
    pub context_item: Option<XdmItem<N>>,
    pub default_collation: Option<String>,
    pub collations: Arc<CollationRegistry>,
    pub node_resolver: Option<Arc<dyn NodeResolver<N>>>,
    pub now: Option<DateTime<FixedOffset>>,
    pub timezone_override: Option<FixedOffset>,
    /// Standard-conformant casting. Off enables duration→numeric and
    /// numeric→temporal casts.
    pub strict_observance: bool,
    pub empty_greatest: bool,
    pub max_call_depth: usize,
    pub(crate) regex_cache: Arc<RegexCache>,
    pub(crate) call_depth: Arc<AtomicUsize>,
}

impl<N> Default for DynamicContext<N> {
    fn default() -> Self {
        Self {
            context_item: None,
            default_collation: None,
            collations: Arc::new(CollationRegistry::default()),
            node_resolver: None,
            now: None,
            timezone_override: None,
            strict_observance: true,
            empty_greatest: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            regex_cache: Arc::new(RegexCache::new(DEFAULT_REGEX_CACHE_CAPACITY)),
            call_depth: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl<N> DynamicContext<N> {
    /// The single constructor for located evaluation errors.
    pub fn error(&self, code: ErrorCode, location: Option<&str>, message: impl Into<String>) -> Error {
        let err = Error::from_code(code, message);
        match location {
            Some(loc) => err.with_location(loc),
            None => err,
        }
    }

    /// Collation registered under `uri`, or `None` when unknown.
    pub fn collator(&self, uri: &str) -> Option<Arc<dyn Collation>> {
        self.collations.get(uri)
    }

    /// Timezone applied to values without one: the override, else the offset
    /// of the fixed current instant, else the host's local offset.
    pub fn implicit_timezone(&self) -> FixedOffset {
        self.timezone_override
            .or_else(|| self.now.map(|n| *n.offset()))
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    /// The current instant, stable for the lifetime of the context.
    pub fn current_date_time(&self) -> DateTime<FixedOffset> {
        let now = self.now.unwrap_or_else(|| Local::now().fixed_offset());
        now.with_timezone(&self.implicit_timezone())
    }

    pub fn compare_context(&self, collation: Arc<dyn Collation>) -> CompareContext {
        CompareContext::new(collation, self.implicit_timezone())
    }
}

pub struct DynamicContextBuilder<N> {
    ctx: DynamicContext<N>,
}

impl<N> Default for DynamicContextBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DynamicContextBuilder<N> {
    pub fn new() -> Self {
        Self { ctx: DynamicContext::default() }
    }

    pub fn with_context_item(mut self, item: impl Into<XdmItem<N>>) -> Self {
        self.ctx.context_item = Some(item.into());
        self
    }

    pub fn with_default_collation(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_collation = Some(uri.into());
        self
    }

    pub fn with_collations(mut self, reg: Arc<CollationRegistry>) -> Self {
        self.ctx.collations = reg;
        self
    }

    pub fn with_node_resolver(mut self, res: Arc<dyn NodeResolver<N>>) -> Self {
        self.ctx.node_resolver = Some(res);
        self
    }

    /// Fixed current instant for deterministic date/time functions.
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.ctx.now = Some(now);
        self
    }

    /// Implicit timezone as minutes east of UTC. Offsets outside ±14:00 are
    /// ignored.
    pub fn with_timezone(mut self, offset_minutes: i32) -> Self {
        if (-14 * 60..=14 * 60).contains(&offset_minutes)
            && let Some(tz) = FixedOffset::east_opt(offset_minutes * 60)
        {
            self.ctx.timezone_override = Some(tz);
        }
        self
    }

    pub fn with_strict_observance(mut self, strict: bool) -> Self {
        self.ctx.strict_observance = strict;
        self
    }

    pub fn with_empty_greatest(mut self, empty_greatest: bool) -> Self {
        self.ctx.empty_greatest = empty_greatest;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.ctx.max_call_depth = depth;
        self
    }

    pub fn with_regex_cache_capacity(mut self, capacity: usize) -> Self {
        self.ctx.regex_cache = Arc::new(RegexCache::new(capacity));
        self
    }

    /// Freeze the context. Without an explicit `now`, the current instant is
    /// captured here so every date/time function of one evaluation agrees.
    pub fn build(mut self) -> DynamicContext<N> {
        if self.ctx.now.is_none() {
            self.ctx.now = Some(Local::now().fixed_offset());
        }
        self.ctx
    }
}
