use rstest::rstest;
use xquery_atomic::consts::FNS;
use xquery_atomic::model::simple::SimpleNode;
use xquery_atomic::{
    AtomicType, DynamicContextBuilder, ErrorCode, ExpandedName, SequenceType, StaticContext, XdmAtomicValue as A,
    XdmSequenceStream, default_function_registry,
};

type Seq = XdmSequenceStream<SimpleNode>;

fn s(v: &str) -> Seq {
    Seq::atomic(A::string(v))
}

fn name(local: &str) -> ExpandedName {
    ExpandedName::new(Some(FNS.to_string()), local)
}

fn call(local: &str, args: &[Seq]) -> Result<Vec<String>, ErrorCode> {
    let registry = default_function_registry::<SimpleNode>();
    let call = registry.resolve_by_arity(&name(local), args.len(), &StaticContext::default()).map_err(|e| e.code_enum())?;
    let out = call.evaluate(args, &DynamicContextBuilder::new().build()).map_err(|e| e.code_enum())?;
    out.map(|item| item.map(|i| i.string_value()).map_err(|e| e.code_enum())).collect()
}

fn matches(input: &str, pattern: &str, flags: Option<&str>) -> Result<bool, ErrorCode> {
    let mut args = vec![s(input), s(pattern)];
    args.extend(flags.map(s));
    Ok(call("matches", &args)?[0] == "true")
}

#[rstest]
#[case("abracadabra", "bra", None, true)]
#[case("abracadabra", "^a.*a$", None, true)]
#[case("abracadabra", "^bra", None, false)]
#[case("Hello", "^hello$", Some("i"), true)]
#[case("line1\nline2", "^line2$", None, false)]
#[case("line1\nline2", "^line2$", Some("m"), true)]
#[case("a\nb", "a.b", None, false)]
#[case("a\nb", "a.b", Some("s"), true)]
#[case("hello world", "hello world", Some("x"), false)]
#[case("helloworld", "hello world", Some("x"), true)]
#[case("xml-name_1", r"^\i\c*$", None, true)]
#[case("bcd", "^[a-z-[aeiou]]+$", None, true)]
#[case("bad", "^[a-z-[aeiou]]+$", None, false)]
fn matches_with_flags(#[case] input: &str, #[case] pattern: &str, #[case] flags: Option<&str>, #[case] expected: bool) {
    assert_eq!(matches(input, pattern, flags).unwrap(), expected);
}

#[rstest]
#[case("a", "(", None, ErrorCode::FORX0002)]
#[case("a", "[a", None, ErrorCode::FORX0002)]
#[case("a", "a", Some("g"), ErrorCode::FORX0001)]
fn invalid_patterns_and_flags(#[case] input: &str, #[case] pattern: &str, #[case] flags: Option<&str>, #[case] code: ErrorCode) {
    assert_eq!(matches(input, pattern, flags).unwrap_err(), code);
}

#[rstest]
#[case("abracadabra", "bra", "*", "a*cada*")]
#[case("abracadabra", "a.*a", "*", "*")]
#[case("abracadabra", "a.*?a", "*", "*c*bra")]
#[case("abracadabra", "a", "", "brcdbr")]
#[case("abracadabra", "a(.)", "a$1$1", "abbraccaddabbra")]
#[case("darted", "^(.*?)d(.*)$", "$1c$2", "carted")]
#[case("AAAA", "A+", "b", "b")]
#[case("price", "price", r"\$5", "$5")]
#[case("abc", "b", "[$0]", "a[b]c")]
fn replacements(#[case] input: &str, #[case] pattern: &str, #[case] replacement: &str, #[case] expected: &str) {
    assert_eq!(call("replace", &[s(input), s(pattern), s(replacement)]).unwrap(), [expected]);
}

#[rstest]
fn replace_errors() {
    assert_eq!(call("replace", &[s("abc"), s(".*"), s("x")]).unwrap_err(), ErrorCode::FORX0003);
    assert_eq!(call("replace", &[s("abc"), s("b"), s("$")]).unwrap_err(), ErrorCode::FORX0004);
    assert_eq!(call("replace", &[s("abc"), s("b"), s(r"\x")]).unwrap_err(), ErrorCode::FORX0004);
    assert_eq!(call("replace", &[s("ABC"), s("b"), s("x"), s("i")]).unwrap(), ["AxC"]);
}

#[rstest]
fn tokenize_forms() {
    assert_eq!(call("tokenize", &[s("The cat sat on the mat"), s(r"\s+")]).unwrap(), ["The", "cat", "sat", "on", "the", "mat"]);
    assert_eq!(call("tokenize", &[s("1, 15, 24, 50"), s(r",\s*")]).unwrap(), ["1", "15", "24", "50"]);
    assert_eq!(call("tokenize", &[s("1,15,,24,50,"), s(",")]).unwrap(), ["1", "15", "", "24", "50", ""]);
    assert_eq!(call("tokenize", &[s("  red\n green\tblue  ")]).unwrap(), ["red", "green", "blue"]);
    assert_eq!(call("tokenize", &[s("aXbxc"), s("x"), s("i")]).unwrap(), ["a", "b", "c"]);
    assert!(call("tokenize", &[s(""), s(",")]).unwrap().is_empty());
    assert!(call("tokenize", &[Seq::empty(), s(",")]).unwrap().is_empty());
    assert_eq!(call("tokenize", &[s("abba"), s(".?")]).unwrap_err(), ErrorCode::FORX0003);
}

#[rstest]
fn literal_patterns_are_compiled_when_the_call_is_bound() {
    let registry = default_function_registry::<SimpleNode>();
    let static_ctx = StaticContext::default();
    let string = SequenceType::one(AtomicType::String);

    let literal = registry
        .compile_call(&name("matches"), &[string, string], &[None, Some(A::string("^a+$"))], &static_ctx)
        .unwrap();
    assert!(literal.is_prepared());
    let ctx = DynamicContextBuilder::new().build();
    // The prepared pattern wins over whatever the argument carries at run time.
    let out = literal.evaluate(&[s("aaa"), s("ignored")], &ctx).unwrap().materialize().unwrap();
    assert_eq!(out[0].string_value(), "true");

    let dynamic = registry.compile_call(&name("matches"), &[string, string], &[None, None], &static_ctx).unwrap();
    assert!(!dynamic.is_prepared());

    let with_flags = registry
        .compile_call(
            &name("matches"),
            &[string, string, string],
            &[None, Some(A::string("^A$")), Some(A::string("i"))],
            &static_ctx,
        )
        .unwrap();
    assert!(with_flags.is_prepared());

    let dynamic_flags = registry
        .compile_call(&name("matches"), &[string, string, string], &[None, Some(A::string("^A$")), None], &static_ctx)
        .unwrap();
    assert!(!dynamic_flags.is_prepared());
}

#[rstest]
fn invalid_literal_patterns_fail_at_bind_time() {
    let registry = default_function_registry::<SimpleNode>();
    let string = SequenceType::one(AtomicType::String);
    let err = registry
        .compile_call(&name("replace"), &[string, string, string], &[None, Some(A::string("(")), None], &StaticContext::default())
        .err()
        .unwrap();
    assert_eq!(err.code_enum(), ErrorCode::FORX0002);
    assert!(err.location.is_some_and(|l| l.contains("replace")));
}
