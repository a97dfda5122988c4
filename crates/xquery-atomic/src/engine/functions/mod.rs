//! The built-in function library.
//!
//! Bodies live in one module per family; this module only declares the
//! signatures. Every overload carries its declared parameter and result
//! types so that [`FunctionRegistry::compile_call`] can rank candidates.
mod aggregates;
mod boolean;
mod common;
mod constructors;
mod datetime;
mod diagnostics;
mod environment;
mod numeric;
mod qnames;
mod regex;
mod sequences;
mod strings;

use std::sync::Arc;

use crate::consts::{FNS, MATH_NS, XS};
use crate::engine::registry::{CallCtx, FunctionRegistry, FunctionSignature};
use crate::model::{NodeKind, XdmNode};
use crate::xdm::{AtomicType as T, ExpandedName, ItemType, Occurrence, SequenceType as S, XdmSequenceStream};
use datetime::{Component, DurationPart};

const ITEMS: S = S::any_items();
const ITEM_OPT: S = S::new(ItemType::AnyItem, Occurrence::ZeroOrOne);
const ITEM_ONE: S = S::new(ItemType::AnyItem, Occurrence::ExactlyOne);
const ITEM_PLUS: S = S::new(ItemType::AnyItem, Occurrence::OneOrMore);
const NODE_OPT: S = S::new(ItemType::Node(None), Occurrence::ZeroOrOne);
const ELEMENT: S = S::new(ItemType::Node(Some(NodeKind::Element)), Occurrence::ExactlyOne);
const DOCUMENT_OPT: S = S::new(ItemType::Node(Some(NodeKind::Document)), Occurrence::ZeroOrOne);
const NUM_OPT: S = S::numeric(Occurrence::ZeroOrOne);
const ATOMICS: S = S::star(T::AnyAtomic);
const ATOMIC_OPT: S = S::opt(T::AnyAtomic);
const STR: S = S::one(T::String);
const STR_OPT: S = S::opt(T::String);
const BOOL: S = S::one(T::Boolean);
const INT: S = S::one(T::Integer);
const INT_OPT: S = S::opt(T::Integer);
const DBL: S = S::one(T::Double);
const DBL_OPT: S = S::opt(T::Double);

fn fn_name(ns: &str, local: &str) -> ExpandedName {
    ExpandedName::new(Some(ns.to_string()), local)
}

type Body<N> = fn(&CallCtx<'_, N>, &[XdmSequenceStream<N>]) -> common::FnResult<N>;

/// Regex overload whose pattern (argument 2) and flags are compiled at bind
/// time when they are literals.
fn regex_sig<N: XdmNode>(local: &str, params: &[S], result: S, body: Body<N>, flags: usize) -> FunctionSignature<N> {
    FunctionSignature::new(fn_name(FNS, local), params, result, Arc::new(body)).with_prepare(regex::precompile(1, flags))
}

/// Registry with the whole built-in library: `fn:`, `math:` and the `xs:`
/// constructor functions.
pub fn default_function_registry<N: XdmNode>() -> FunctionRegistry<N> {
    let mut reg: FunctionRegistry<N> = FunctionRegistry::new();

    // ===== Core booleans =====
    reg.register_ns(FNS, "true", &[], BOOL, boolean::true_fn);
    reg.register_ns(FNS, "false", &[], BOOL, boolean::false_fn);
    reg.register_ns(FNS, "not", &[ITEMS], BOOL, boolean::not_fn);
    reg.register_ns(FNS, "boolean", &[ITEMS], BOOL, boolean::boolean_fn);

    // ===== Numeric family =====
    reg.register_ns(FNS, "abs", &[NUM_OPT], NUM_OPT, numeric::abs_fn);
    reg.register_ns(FNS, "ceiling", &[NUM_OPT], NUM_OPT, numeric::ceiling_fn);
    reg.register_ns(FNS, "floor", &[NUM_OPT], NUM_OPT, numeric::floor_fn);
    reg.register_ns(FNS, "round", &[NUM_OPT], NUM_OPT, numeric::round_fn);
    reg.register_ns(FNS, "round", &[NUM_OPT, INT], NUM_OPT, numeric::round_fn);
    reg.register_ns(FNS, "round-half-to-even", &[NUM_OPT], NUM_OPT, numeric::round_half_to_even_fn);
    reg.register_ns(FNS, "round-half-to-even", &[NUM_OPT, INT], NUM_OPT, numeric::round_half_to_even_fn);
    reg.register_ns(FNS, "number", &[], DBL, numeric::number_fn);
    reg.register_ns(FNS, "number", &[ATOMIC_OPT], DBL, numeric::number_fn);

    reg.register_ns(MATH_NS, "pi", &[], DBL, numeric::pi_fn);
    reg.register_ns(MATH_NS, "sqrt", &[DBL_OPT], DBL_OPT, numeric::sqrt_fn);
    reg.register_ns(MATH_NS, "exp", &[DBL_OPT], DBL_OPT, numeric::exp_fn);
    reg.register_ns(MATH_NS, "exp10", &[DBL_OPT], DBL_OPT, numeric::exp10_fn);
    reg.register_ns(MATH_NS, "log", &[DBL_OPT], DBL_OPT, numeric::log_fn);
    reg.register_ns(MATH_NS, "log10", &[DBL_OPT], DBL_OPT, numeric::log10_fn);
    reg.register_ns(MATH_NS, "sin", &[DBL_OPT], DBL_OPT, numeric::sin_fn);
    reg.register_ns(MATH_NS, "cos", &[DBL_OPT], DBL_OPT, numeric::cos_fn);
    reg.register_ns(MATH_NS, "tan", &[DBL_OPT], DBL_OPT, numeric::tan_fn);
    reg.register_ns(MATH_NS, "asin", &[DBL_OPT], DBL_OPT, numeric::asin_fn);
    reg.register_ns(MATH_NS, "acos", &[DBL_OPT], DBL_OPT, numeric::acos_fn);
    reg.register_ns(MATH_NS, "atan", &[DBL_OPT], DBL_OPT, numeric::atan_fn);
    reg.register_ns(MATH_NS, "atan2", &[DBL, DBL], DBL, numeric::atan2_fn);
    reg.register_ns(MATH_NS, "pow", &[DBL_OPT, S::numeric(Occurrence::ExactlyOne)], DBL_OPT, numeric::pow_fn);

    // ===== Aggregates =====
    reg.register_ns(FNS, "count", &[ITEMS], INT, aggregates::count_fn);
    reg.register_ns(FNS, "sum", &[ATOMICS], ATOMIC_OPT, aggregates::sum_fn);
    reg.register_ns(FNS, "sum", &[ATOMICS, ATOMIC_OPT], ATOMIC_OPT, aggregates::sum_fn);
    reg.register_ns(FNS, "avg", &[ATOMICS], ATOMIC_OPT, aggregates::avg_fn);
    reg.register_ns(FNS, "max", &[ATOMICS], ATOMIC_OPT, aggregates::max_fn);
    reg.register_ns(FNS, "max", &[ATOMICS, STR], ATOMIC_OPT, aggregates::max_fn);
    reg.register_ns(FNS, "min", &[ATOMICS], ATOMIC_OPT, aggregates::min_fn);
    reg.register_ns(FNS, "min", &[ATOMICS, STR], ATOMIC_OPT, aggregates::min_fn);
    reg.register_ns(FNS, "distinct-values", &[ATOMICS], ATOMICS, aggregates::distinct_values_fn);
    reg.register_ns(FNS, "distinct-values", &[ATOMICS, STR], ATOMICS, aggregates::distinct_values_fn);

    // ===== String family =====
    reg.register_ns(FNS, "string", &[], STR, strings::string_fn);
    reg.register_ns(FNS, "string", &[ITEM_OPT], STR, strings::string_fn);
    reg.register(
        FunctionSignature::new(fn_name(FNS, "concat"), &[ATOMIC_OPT, ATOMIC_OPT], STR, Arc::new(strings::concat_fn::<N>))
            .variadic(),
    );
    reg.register_ns(FNS, "string-join", &[ATOMICS], STR, strings::string_join_fn);
    reg.register_ns(FNS, "string-join", &[ATOMICS, STR], STR, strings::string_join_fn);
    reg.register_ns(FNS, "substring", &[STR_OPT, DBL], STR, strings::substring_fn);
    reg.register_ns(FNS, "substring", &[STR_OPT, DBL, DBL], STR, strings::substring_fn);
    reg.register_ns(FNS, "string-length", &[], INT, strings::string_length_fn);
    reg.register_ns(FNS, "string-length", &[STR_OPT], INT, strings::string_length_fn);
    reg.register_ns(FNS, "normalize-space", &[], STR, strings::normalize_space_fn);
    reg.register_ns(FNS, "normalize-space", &[STR_OPT], STR, strings::normalize_space_fn);
    reg.register_ns(FNS, "upper-case", &[STR_OPT], STR, strings::upper_case_fn);
    reg.register_ns(FNS, "lower-case", &[STR_OPT], STR, strings::lower_case_fn);
    reg.register_ns(FNS, "translate", &[STR_OPT, STR, STR], STR, strings::translate_fn);
    reg.register_ns(FNS, "codepoint-equal", &[STR_OPT, STR_OPT], S::opt(T::Boolean), strings::codepoint_equal_fn);
    reg.register_ns(FNS, "string-to-codepoints", &[STR_OPT], S::star(T::Integer), strings::string_to_codepoints_fn);
    reg.register_ns(FNS, "codepoints-to-string", &[S::star(T::Integer)], STR, strings::codepoints_to_string_fn);
    reg.register_ns(FNS, "normalize-unicode", &[STR_OPT], STR, strings::normalize_unicode_fn);
    reg.register_ns(FNS, "normalize-unicode", &[STR_OPT, STR], STR, strings::normalize_unicode_fn);

    // ===== Collation-related functions =====
    reg.register_ns(FNS, "compare", &[STR_OPT, STR_OPT], INT_OPT, strings::compare_fn);
    reg.register_ns(FNS, "compare", &[STR_OPT, STR_OPT, STR], INT_OPT, strings::compare_fn);
    reg.register_ns(FNS, "contains", &[STR_OPT, STR_OPT], BOOL, strings::contains_fn);
    reg.register_ns(FNS, "contains", &[STR_OPT, STR_OPT, STR], BOOL, strings::contains_fn);
    reg.register_ns(FNS, "starts-with", &[STR_OPT, STR_OPT], BOOL, strings::starts_with_fn);
    reg.register_ns(FNS, "starts-with", &[STR_OPT, STR_OPT, STR], BOOL, strings::starts_with_fn);
    reg.register_ns(FNS, "ends-with", &[STR_OPT, STR_OPT], BOOL, strings::ends_with_fn);
    reg.register_ns(FNS, "ends-with", &[STR_OPT, STR_OPT, STR], BOOL, strings::ends_with_fn);
    reg.register_ns(FNS, "substring-before", &[STR_OPT, STR_OPT], STR, strings::substring_before_fn);
    reg.register_ns(FNS, "substring-before", &[STR_OPT, STR_OPT, STR], STR, strings::substring_before_fn);
    reg.register_ns(FNS, "substring-after", &[STR_OPT, STR_OPT], STR, strings::substring_after_fn);
    reg.register_ns(FNS, "substring-after", &[STR_OPT, STR_OPT, STR], STR, strings::substring_after_fn);

    // ===== Regex family =====
    reg.register(regex_sig("matches", &[STR_OPT, STR], BOOL, regex::matches_fn, 2));
    reg.register(regex_sig("matches", &[STR_OPT, STR, STR], BOOL, regex::matches_fn, 2));
    reg.register(regex_sig("replace", &[STR_OPT, STR, STR], STR, regex::replace_fn, 3));
    reg.register(regex_sig("replace", &[STR_OPT, STR, STR, STR], STR, regex::replace_fn, 3));
    reg.register_ns(FNS, "tokenize", &[STR_OPT], S::star(T::String), regex::tokenize_fn);
    reg.register(regex_sig("tokenize", &[STR_OPT, STR], S::star(T::String), regex::tokenize_fn, 2));
    reg.register(regex_sig("tokenize", &[STR_OPT, STR, STR], S::star(T::String), regex::tokenize_fn, 2));

    // ===== URI helpers =====
    reg.register_ns(FNS, "encode-for-uri", &[STR_OPT], STR, strings::encode_for_uri_fn);
    reg.register_ns(FNS, "iri-to-uri", &[STR_OPT], STR, strings::iri_to_uri_fn);
    reg.register_ns(FNS, "escape-html-uri", &[STR_OPT], STR, strings::escape_html_uri_fn);
    reg.register_ns(FNS, "resolve-uri", &[STR_OPT], S::opt(T::AnyUri), strings::resolve_uri_fn);
    reg.register_ns(FNS, "resolve-uri", &[STR_OPT, STR], S::opt(T::AnyUri), strings::resolve_uri_fn);

    // ===== Sequence family =====
    reg.register_ns(FNS, "empty", &[ITEMS], BOOL, sequences::empty_fn);
    reg.register_ns(FNS, "exists", &[ITEMS], BOOL, sequences::exists_fn);
    reg.register_ns(FNS, "reverse", &[ITEMS], ITEMS, sequences::reverse_fn);
    reg.register_ns(FNS, "zero-or-one", &[ITEMS], ITEM_OPT, sequences::zero_or_one_fn);
    reg.register_ns(FNS, "one-or-more", &[ITEMS], ITEM_PLUS, sequences::one_or_more_fn);
    reg.register_ns(FNS, "exactly-one", &[ITEMS], ITEM_ONE, sequences::exactly_one_fn);
    reg.register_ns(FNS, "unordered", &[ITEMS], ITEMS, sequences::unordered_fn);
    reg.register_ns(FNS, "data", &[], ATOMICS, sequences::data_fn);
    reg.register_ns(FNS, "data", &[ITEMS], ATOMICS, sequences::data_fn);
    reg.register_ns(FNS, "deep-equal", &[ITEMS, ITEMS], BOOL, sequences::deep_equal_fn);
    reg.register_ns(FNS, "deep-equal", &[ITEMS, ITEMS, STR], BOOL, sequences::deep_equal_fn);
    reg.register_ns(FNS, "index-of", &[ATOMICS, S::one(T::AnyAtomic)], S::star(T::Integer), sequences::index_of_fn);
    reg.register_ns(FNS, "index-of", &[ATOMICS, S::one(T::AnyAtomic), STR], S::star(T::Integer), sequences::index_of_fn);
    reg.register_ns(FNS, "insert-before", &[ITEMS, INT, ITEMS], ITEMS, sequences::insert_before_fn);
    reg.register_ns(FNS, "remove", &[ITEMS, INT], ITEMS, sequences::remove_fn);
    reg.register_ns(FNS, "subsequence", &[ITEMS, DBL], ITEMS, sequences::subsequence_fn);
    reg.register_ns(FNS, "subsequence", &[ITEMS, DBL, DBL], ITEMS, sequences::subsequence_fn);
    reg.register_ns(FNS, "item-at", &[ITEMS, INT_OPT], ITEM_OPT, sequences::item_at_fn);

    // ===== QName / namespace functions =====
    reg.register_ns(FNS, "QName", &[STR_OPT, STR], S::one(T::QName), qnames::qname_fn);
    reg.register_ns(FNS, "resolve-QName", &[STR_OPT, ELEMENT], S::opt(T::QName), qnames::resolve_qname_fn);
    reg.register_ns(FNS, "local-name-from-QName", &[S::opt(T::QName)], S::opt(T::NcName), qnames::local_name_from_qname_fn);
    reg.register_ns(
        FNS,
        "namespace-uri-from-QName",
        &[S::opt(T::QName)],
        S::opt(T::AnyUri),
        qnames::namespace_uri_from_qname_fn,
    );
    reg.register_ns(FNS, "prefix-from-QName", &[S::opt(T::QName)], S::opt(T::NcName), qnames::prefix_from_qname_fn);
    reg.register_ns(
        FNS,
        "namespace-uri-for-prefix",
        &[STR_OPT, ELEMENT],
        S::opt(T::AnyUri),
        qnames::namespace_uri_for_prefix_fn,
    );
    reg.register_ns(FNS, "in-scope-prefixes", &[ELEMENT], S::star(T::String), qnames::in_scope_prefixes_fn);

    // ===== Node name functions =====
    reg.register_ns(FNS, "name", &[], STR, qnames::name_fn);
    reg.register_ns(FNS, "name", &[NODE_OPT], STR, qnames::name_fn);
    reg.register_ns(FNS, "local-name", &[], STR, qnames::local_name_fn);
    reg.register_ns(FNS, "local-name", &[NODE_OPT], STR, qnames::local_name_fn);
    reg.register_ns(FNS, "namespace-uri", &[], S::one(T::AnyUri), qnames::namespace_uri_fn);
    reg.register_ns(FNS, "namespace-uri", &[NODE_OPT], S::one(T::AnyUri), qnames::namespace_uri_fn);

    // ===== Date/Time family =====
    reg.register_ns(FNS, "current-dateTime", &[], S::one(T::DateTime), datetime::current_date_time_fn);
    reg.register_ns(FNS, "current-date", &[], S::one(T::Date), datetime::current_date_fn);
    reg.register_ns(FNS, "current-time", &[], S::one(T::Time), datetime::current_time_fn);
    reg.register_ns(FNS, "implicit-timezone", &[], S::one(T::DayTimeDuration), datetime::implicit_timezone_fn);
    reg.register_ns(FNS, "dateTime", &[S::opt(T::Date), S::opt(T::Time)], S::opt(T::DateTime), datetime::date_time_fn);
    for (local, ty) in [
        ("adjust-dateTime-to-timezone", T::DateTime),
        ("adjust-date-to-timezone", T::Date),
        ("adjust-time-to-timezone", T::Time),
    ] {
        for params in [&[S::opt(ty)][..], &[S::opt(ty), S::opt(T::DayTimeDuration)]] {
            reg.register_ns(FNS, local, params, S::opt(ty), move |ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]| {
                datetime::adjust_to_timezone(ctx, args, ty)
            });
        }
    }

    let components = [
        ("year-from-dateTime", T::DateTime, Component::Year),
        ("month-from-dateTime", T::DateTime, Component::Month),
        ("day-from-dateTime", T::DateTime, Component::Day),
        ("hours-from-dateTime", T::DateTime, Component::Hours),
        ("minutes-from-dateTime", T::DateTime, Component::Minutes),
        ("seconds-from-dateTime", T::DateTime, Component::Seconds),
        ("timezone-from-dateTime", T::DateTime, Component::Timezone),
        ("year-from-date", T::Date, Component::Year),
        ("month-from-date", T::Date, Component::Month),
        ("day-from-date", T::Date, Component::Day),
        ("timezone-from-date", T::Date, Component::Timezone),
        ("hours-from-time", T::Time, Component::Hours),
        ("minutes-from-time", T::Time, Component::Minutes),
        ("seconds-from-time", T::Time, Component::Seconds),
        ("timezone-from-time", T::Time, Component::Timezone),
    ];
    for (local, ty, component) in components {
        let result = match component {
            Component::Seconds => S::opt(T::Decimal),
            Component::Timezone => S::opt(T::DayTimeDuration),
            _ => INT_OPT,
        };
        reg.register_ns(FNS, local, &[S::opt(ty)], result, move |ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]| {
            datetime::moment_component(ctx, args, ty, component)
        });
    }

    // ===== Duration component accessors =====
    for (local, part) in [
        ("years-from-duration", DurationPart::Years),
        ("months-from-duration", DurationPart::Months),
        ("days-from-duration", DurationPart::Days),
        ("hours-from-duration", DurationPart::Hours),
        ("minutes-from-duration", DurationPart::Minutes),
        ("seconds-from-duration", DurationPart::Seconds),
    ] {
        let result = if part == DurationPart::Seconds { S::opt(T::Decimal) } else { INT_OPT };
        reg.register_ns(FNS, local, &[S::opt(T::Duration)], result, move |ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]| {
            datetime::duration_component(ctx, args, part)
        });
    }

    // ===== Environment / document access =====
    reg.register_ns(FNS, "doc", &[STR_OPT], DOCUMENT_OPT, environment::doc_fn);
    reg.register_ns(FNS, "doc-available", &[STR_OPT], BOOL, environment::doc_available_fn);
    reg.register_ns(FNS, "default-collation", &[], STR, environment::default_collation_fn);
    reg.register_ns(FNS, "static-base-uri", &[], S::opt(T::AnyUri), environment::static_base_uri_fn);

    // ===== Diagnostics =====
    reg.register_ns(FNS, "error", &[], S::EMPTY, diagnostics::error_fn);
    reg.register_ns(FNS, "error", &[S::opt(T::QName)], S::EMPTY, diagnostics::error_fn);
    reg.register_ns(FNS, "error", &[S::opt(T::QName), STR], S::EMPTY, diagnostics::error_fn);
    reg.register_ns(FNS, "error", &[S::opt(T::QName), STR, ITEMS], S::EMPTY, diagnostics::error_fn);
    reg.register_ns(FNS, "trace", &[ITEMS], ITEMS, diagnostics::trace_fn);
    reg.register_ns(FNS, "trace", &[ITEMS, STR], ITEMS, diagnostics::trace_fn);

    // ===== XML Schema constructors (xs:*) =====
    for ty in constructors::constructible() {
        reg.register_ns(XS, ty.local_name(), &[ATOMIC_OPT], S::opt(ty), move |ctx: &CallCtx<'_, N>, args: &[XdmSequenceStream<N>]| {
            constructors::construct(ctx, args, ty)
        });
    }

    tracing::debug!(functions = reg.len(), "default function registry built");
    reg
}
