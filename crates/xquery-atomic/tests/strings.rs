use rstest::rstest;
use xquery_atomic::consts::{FNS, SIMPLE_CASE_ACCENT_URI, SIMPLE_CASE_URI};
use xquery_atomic::model::simple::{SimpleNode, elem, text};
use xquery_atomic::{
    DynamicContext, DynamicContextBuilder, ErrorCode, ExpandedName, StaticContext, StaticContextBuilder,
    XdmAtomicValue as A, XdmItem, XdmSequenceStream, default_function_registry,
};

type Seq = XdmSequenceStream<SimpleNode>;

fn s(v: &str) -> Seq {
    Seq::atomic(A::string(v))
}

fn d(v: f64) -> Seq {
    Seq::atomic(A::double(v))
}

fn call_in(
    name: &str,
    args: &[Seq],
    static_ctx: &StaticContext,
    ctx: &DynamicContext<SimpleNode>,
) -> Result<Vec<A>, ErrorCode> {
    let registry = default_function_registry::<SimpleNode>();
    let fname = ExpandedName::new(Some(FNS.to_string()), name);
    let call = registry.resolve_by_arity(&fname, args.len(), static_ctx).map_err(|e| e.code_enum())?;
    let out = call.evaluate(args, ctx).map_err(|e| e.code_enum())?;
    out.map(|item| item.map(|i| i.as_atomic().cloned().unwrap()).map_err(|e| e.code_enum())).collect()
}

fn call(name: &str, args: &[Seq]) -> Result<Vec<A>, ErrorCode> {
    call_in(name, args, &StaticContext::default(), &DynamicContextBuilder::new().build())
}

fn string_result(name: &str, args: &[Seq]) -> String {
    let out = call(name, args).unwrap();
    assert_eq!(out.len(), 1, "{name} should return one item");
    out[0].string_like().unwrap().to_string()
}

#[rstest]
fn concat_is_variadic_and_skips_empty_arguments() {
    assert_eq!(string_result("concat", &[s("a"), Seq::empty(), Seq::atomic(A::integer(1)), s("b")]), "a1b");
    assert_eq!(string_result("concat", &[Seq::atomic(A::boolean(true)), d(1.5)]), "true1.5");
    assert_eq!(call("concat", &[s("a"), Seq::from_atomics([A::string("x"), A::string("y")])]).unwrap_err(), ErrorCode::XPTY0004);
}

#[rstest]
fn string_join_forms() {
    let parts = Seq::from_atomics([A::string("a"), A::integer(2), A::string("c")]);
    assert_eq!(string_result("string-join", &[parts.clone(), s("-")]), "a-2-c");
    assert_eq!(string_result("string-join", &[parts]), "a2c");
    assert_eq!(string_result("string-join", &[Seq::empty(), s(",")]), "");
}

#[rstest]
#[case("12345", 2.0, None, "2345")]
#[case("12345", 1.5, Some(2.6), "234")]
#[case("12345", 0.0, Some(3.0), "12")]
#[case("12345", f64::NAN, Some(3.0), "")]
#[case("12345", 1.0, Some(f64::NAN), "")]
#[case("12345", -42.0, Some(f64::INFINITY), "12345")]
#[case("12345", f64::NEG_INFINITY, Some(f64::INFINITY), "")]
#[case("motör", 4.0, None, "ör")]
fn substring_windows(#[case] input: &str, #[case] start: f64, #[case] len: Option<f64>, #[case] expected: &str) {
    let mut args = vec![s(input), d(start)];
    args.extend(len.map(d));
    assert_eq!(string_result("substring", &args), expected);
}

#[rstest]
fn string_length_counts_codepoints_and_reads_the_focus() {
    assert_eq!(call("string-length", &[s("héllo")]).unwrap(), [A::integer(5)]);
    assert_eq!(call("string-length", &[Seq::empty()]).unwrap(), [A::integer(0)]);

    let ctx = DynamicContextBuilder::new().with_context_item(XdmItem::Node(elem("p").child(text("abc")).build())).build();
    let out = call_in("string-length", &[], &StaticContext::default(), &ctx).unwrap();
    assert_eq!(out, [A::integer(3)]);
    let out = call_in("string", &[], &StaticContext::default(), &ctx).unwrap();
    assert_eq!(out, [A::string("abc")]);

    let no_focus = call("string-length", &[]).unwrap_err();
    assert_eq!(no_focus, ErrorCode::XPDY0002);
}

#[rstest]
fn string_of_items() {
    assert_eq!(string_result("string", &[Seq::atomic(A::double(1e21))]), "1.0E21");
    assert_eq!(string_result("string", &[Seq::empty()]), "");
    let two = Seq::from_atomics([A::integer(1), A::integer(2)]);
    assert_eq!(call("string", &[two]).unwrap_err(), ErrorCode::XPTY0004);
}

#[rstest]
#[case("normalize-space", "  a \t b\n ", "a b")]
#[case("upper-case", "abCd", "ABCD")]
#[case("lower-case", "ABcD", "abcd")]
#[case("encode-for-uri", "100% organic", "100%25%20organic")]
#[case("iri-to-uri", "http://example.com/~bébé", "http://example.com/~b%C3%A9b%C3%A9")]
#[case("escape-html-uri", "http://a/é b", "http://a/%C3%A9 b")]
fn single_string_functions(#[case] name: &str, #[case] input: &str, #[case] expected: &str) {
    assert_eq!(string_result(name, &[s(input)]), expected);
}

#[rstest]
#[case("bar", "abc", "ABC", "BAr")]
#[case("--aaa--", "abc-", "ABC", "AAA")]
#[case("abcdabc", "abc", "AB", "ABdAB")]
fn translate_maps_and_drops(#[case] input: &str, #[case] map: &str, #[case] trans: &str, #[case] expected: &str) {
    assert_eq!(string_result("translate", &[s(input), s(map), s(trans)]), expected);
}

#[rstest]
fn string_arguments_are_not_coerced_from_numbers() {
    assert_eq!(call("upper-case", &[Seq::atomic(A::integer(1))]).unwrap_err(), ErrorCode::XPTY0004);
    assert_eq!(string_result("upper-case", &[Seq::atomic(A::untyped("x"))]), "X");
}

#[rstest]
fn codepoints_round_trip_and_reject_invalid_characters() {
    let cps = call("string-to-codepoints", &[s("Thé")]).unwrap();
    assert_eq!(cps, [A::integer(84), A::integer(104), A::integer(233)]);
    assert_eq!(string_result("codepoints-to-string", &[Seq::from_atomics(cps)]), "Thé");
    assert!(call("string-to-codepoints", &[Seq::empty()]).unwrap().is_empty());
    let bad = call("codepoints-to-string", &[Seq::atomic(A::integer(0))]).unwrap_err();
    assert_eq!(bad, ErrorCode::FOCH0001);
}

#[rstest]
fn normalize_unicode_forms() {
    let decomposed = "e\u{301}";
    assert_eq!(string_result("normalize-unicode", &[s(decomposed)]), "\u{e9}");
    assert_eq!(string_result("normalize-unicode", &[s("\u{e9}"), s(" nfd ")]), decomposed);
    assert_eq!(string_result("normalize-unicode", &[s(decomposed), s("")]), decomposed);
    assert_eq!(call("normalize-unicode", &[s("x"), s("NFX")]).unwrap_err(), ErrorCode::FOCH0003);
}

#[rstest]
#[case("contains", "tattoo", "t", true)]
#[case("contains", "tattoo", "ttt", false)]
#[case("contains", "", "", true)]
#[case("starts-with", "tattoo", "tat", true)]
#[case("ends-with", "tattoo", "too", true)]
#[case("ends-with", "tattoo", "tat", false)]
fn containment_under_codepoints(#[case] name: &str, #[case] input: &str, #[case] sub: &str, #[case] expected: bool) {
    assert_eq!(call(name, &[s(input), s(sub)]).unwrap(), [A::boolean(expected)]);
}

#[rstest]
fn containment_under_a_case_blind_collation() {
    let ci = s(SIMPLE_CASE_URI);
    assert_eq!(call("contains", &[s("Hello World"), s("WORLD"), ci.clone()]).unwrap(), [A::boolean(true)]);
    assert_eq!(call("starts-with", &[s("Hello"), s("hE"), ci]).unwrap(), [A::boolean(true)]);
    let err = call("contains", &[s("a"), s("a"), s("urn:unknown")]).unwrap_err();
    assert_eq!(err, ErrorCode::FOCH0002);
}

#[rstest]
fn substring_before_and_after() {
    assert_eq!(string_result("substring-before", &[s("tattoo"), s("attoo")]), "t");
    assert_eq!(string_result("substring-after", &[s("tattoo"), s("tat")]), "too");
    assert_eq!(string_result("substring-after", &[s("tattoo"), s("xyz")]), "");
    assert_eq!(string_result("substring-before", &[s("tattoo"), s("")]), "");
    let ci = s(SIMPLE_CASE_ACCENT_URI);
    assert_eq!(string_result("substring-after", &[s("Café CRÈME"), s("creme"), ci.clone()]), "");
    assert_eq!(string_result("substring-before", &[s("Café CRÈME"), s("creme"), ci]), "Café ");
}

#[rstest]
fn compare_and_codepoint_equal() {
    assert_eq!(call("compare", &[s("abc"), s("abd")]).unwrap(), [A::integer(-1)]);
    assert_eq!(call("compare", &[s("b"), s("a")]).unwrap(), [A::integer(1)]);
    assert_eq!(call("compare", &[s("ABC"), s("abc"), s(SIMPLE_CASE_URI)]).unwrap(), [A::integer(0)]);
    assert!(call("compare", &[Seq::empty(), s("a")]).unwrap().is_empty());
    assert_eq!(call("codepoint-equal", &[s("a"), s("a")]).unwrap(), [A::boolean(true)]);
    assert!(call("codepoint-equal", &[s("a"), Seq::empty()]).unwrap().is_empty());
}

#[rstest]
fn resolve_uri_against_explicit_and_static_bases() {
    let out = call("resolve-uri", &[s("b/c"), s("http://example.com/a/")]).unwrap();
    assert_eq!(out, [A::any_uri("http://example.com/a/b/c")]);
    let out = call("resolve-uri", &[s("http://other.org/x")]).unwrap();
    assert_eq!(out, [A::any_uri("http://other.org/x")]);
    assert_eq!(call("resolve-uri", &[s("x")]).unwrap_err(), ErrorCode::FONS0005);
    assert_eq!(call("resolve-uri", &[s("x"), s("not a base")]).unwrap_err(), ErrorCode::FORG0002);

    let static_ctx = StaticContextBuilder::new().with_base_uri("file:///data/in/").build();
    let out = call_in("resolve-uri", &[s("../out.xml")], &static_ctx, &DynamicContextBuilder::new().build()).unwrap();
    assert_eq!(out, [A::any_uri("file:///data/out.xml")]);
}
