use chrono::DateTime;
use rstest::rstest;
use rust_decimal::Decimal;
use xquery_atomic::consts::FNS;
use xquery_atomic::model::simple::SimpleNode;
use xquery_atomic::xdm::compare::compare_atomic;
use xquery_atomic::xdm::derived::distinct_values;
use xquery_atomic::xdm::{CastContext, CompareContext, CompareFlags};
use xquery_atomic::{
    AtomicType, Comparison, DynamicContext, DynamicContextBuilder, ErrorCode, ExpandedName, StaticContext, XdmAtomicValue as A,
    XdmSequenceStream, default_function_registry,
};

type Seq = XdmSequenceStream<SimpleNode>;

fn value(ty: AtomicType, lexical: &str) -> A {
    ty.cast(&A::string(lexical), &CastContext::default()).unwrap()
}

fn v(ty: AtomicType, lexical: &str) -> Seq {
    Seq::atomic(value(ty, lexical))
}

fn fixed_ctx() -> DynamicContext<SimpleNode> {
    let now = DateTime::parse_from_rfc3339("2024-03-01T10:15:30+01:00").unwrap();
    DynamicContextBuilder::new().with_now(now).build()
}

fn call_with(name: &str, args: &[Seq], ctx: &DynamicContext<SimpleNode>) -> Result<Vec<A>, ErrorCode> {
    let registry = default_function_registry::<SimpleNode>();
    let fname = ExpandedName::new(Some(FNS.to_string()), name);
    let call = registry.resolve_by_arity(&fname, args.len(), &StaticContext::default()).map_err(|e| e.code_enum())?;
    let out = call.evaluate(args, ctx).map_err(|e| e.code_enum())?;
    out.map(|item| item.map(|i| i.as_atomic().cloned().unwrap()).map_err(|e| e.code_enum())).collect()
}

fn call(name: &str, args: &[Seq]) -> Result<Vec<A>, ErrorCode> {
    call_with(name, args, &fixed_ctx())
}

fn lexical(name: &str, args: &[Seq], ctx: &DynamicContext<SimpleNode>) -> String {
    let out = call_with(name, args, ctx).unwrap();
    assert_eq!(out.len(), 1, "{name} should return one item");
    out[0].as_string()
}

fn hours(h: i64) -> A {
    A::day_time_duration(Decimal::from(h * 3600))
}

#[rstest]
fn current_values_come_from_the_fixed_instant() {
    let ctx = fixed_ctx();
    assert_eq!(lexical("current-dateTime", &[], &ctx), "2024-03-01T10:15:30+01:00");
    assert_eq!(lexical("current-date", &[], &ctx), "2024-03-01+01:00");
    assert_eq!(lexical("current-time", &[], &ctx), "10:15:30+01:00");
    assert_eq!(call_with("implicit-timezone", &[], &ctx).unwrap(), [hours(1)]);
}

#[rstest]
fn timezone_override_reexpresses_the_current_instant() {
    let now = DateTime::parse_from_rfc3339("2024-03-01T00:30:00+01:00").unwrap();
    let ctx = DynamicContextBuilder::<SimpleNode>::new().with_now(now).with_timezone(-300).build();
    assert_eq!(lexical("current-dateTime", &[], &ctx), "2024-02-29T18:30:00-05:00");
    assert_eq!(lexical("current-date", &[], &ctx), "2024-02-29-05:00");
    assert_eq!(call_with("implicit-timezone", &[], &ctx).unwrap(), [hours(-5)]);
}

#[rstest]
fn current_date_time_is_stable_within_one_context() {
    let ctx = DynamicContextBuilder::<SimpleNode>::new().build();
    let first = call_with("current-dateTime", &[], &ctx).unwrap();
    let second = call_with("current-dateTime", &[], &ctx).unwrap();
    assert_eq!(first, second);
}

#[rstest]
#[case("2024-01-15", "10:30:00", "2024-01-15T10:30:00")]
#[case("2024-01-15Z", "10:30:00", "2024-01-15T10:30:00Z")]
#[case("2024-01-15", "10:30:00.5-03:00", "2024-01-15T10:30:00.5-03:00")]
#[case("2024-01-15+02:00", "10:30:00+02:00", "2024-01-15T10:30:00+02:00")]
fn date_time_combines_date_and_time(#[case] date: &str, #[case] time: &str, #[case] expected: &str) {
    let out = call("dateTime", &[v(AtomicType::Date, date), v(AtomicType::Time, time)]).unwrap();
    assert_eq!(out, [value(AtomicType::DateTime, expected)]);
}

#[rstest]
fn date_time_rejects_conflicting_zones_and_passes_empty_through() {
    let err = call("dateTime", &[v(AtomicType::Date, "2024-01-15+01:00"), v(AtomicType::Time, "10:00:00Z")]).unwrap_err();
    assert_eq!(err, ErrorCode::FORG0008);
    assert!(call("dateTime", &[Seq::empty(), v(AtomicType::Time, "10:00:00")]).unwrap().is_empty());
    let wrong = call("dateTime", &[v(AtomicType::DateTime, "2024-01-15T00:00:00"), v(AtomicType::Time, "10:00:00")]);
    assert_eq!(wrong.unwrap_err(), ErrorCode::XPTY0004);
}

#[rstest]
#[case("adjust-dateTime-to-timezone", AtomicType::DateTime, "2002-03-07T10:00:00-05:00", Some(-10), "2002-03-07T05:00:00-10:00")]
#[case("adjust-dateTime-to-timezone", AtomicType::DateTime, "2002-03-07T10:00:00", Some(-10), "2002-03-07T10:00:00-10:00")]
#[case("adjust-dateTime-to-timezone", AtomicType::DateTime, "2002-03-07T10:00:00-07:00", None, "2002-03-07T10:00:00")]
#[case("adjust-date-to-timezone", AtomicType::Date, "2002-03-07-07:00", Some(-10), "2002-03-06-10:00")]
#[case("adjust-date-to-timezone", AtomicType::Date, "2002-03-07", Some(-10), "2002-03-07-10:00")]
#[case("adjust-time-to-timezone", AtomicType::Time, "10:00:00-07:00", Some(-10), "07:00:00-10:00")]
#[case("adjust-time-to-timezone", AtomicType::Time, "10:00:00-07:00", None, "10:00:00")]
fn explicit_timezone_adjustment(
    #[case] name: &str,
    #[case] ty: AtomicType,
    #[case] input: &str,
    #[case] target_hours: Option<i64>,
    #[case] expected: &str,
) {
    let target = target_hours.map_or_else(Seq::empty, |h| Seq::atomic(hours(h)));
    let out = call(name, &[v(ty, input), target]).unwrap();
    assert_eq!(out, [value(ty, expected)]);
}

#[rstest]
fn one_argument_adjustment_uses_the_implicit_timezone() {
    let ctx = DynamicContextBuilder::<SimpleNode>::new().with_timezone(-300).build();
    let input = v(AtomicType::DateTime, "2002-03-07T10:00:00");
    assert_eq!(lexical("adjust-dateTime-to-timezone", &[input], &ctx), "2002-03-07T10:00:00-05:00");
    let zoned = v(AtomicType::DateTime, "2002-03-07T10:00:00Z");
    assert_eq!(lexical("adjust-dateTime-to-timezone", &[zoned], &ctx), "2002-03-07T05:00:00-05:00");
    assert!(call_with("adjust-date-to-timezone", &[Seq::empty()], &ctx).unwrap().is_empty());
}

#[rstest]
#[case(Decimal::from(15 * 3600))]
#[case(Decimal::from(-15 * 3600))]
#[case(Decimal::from(5 * 3600 + 10))]
#[case(Decimal::new(36_005, 1))]
fn invalid_adjustment_offsets(#[case] seconds: Decimal) {
    let err = call(
        "adjust-dateTime-to-timezone",
        &[v(AtomicType::DateTime, "2002-03-07T10:00:00"), Seq::atomic(A::day_time_duration(seconds))],
    )
    .unwrap_err();
    assert_eq!(err, ErrorCode::FODT0003);
}

#[rstest]
fn adjustment_needs_a_day_time_duration() {
    let err = call(
        "adjust-dateTime-to-timezone",
        &[v(AtomicType::DateTime, "2002-03-07T10:00:00"), Seq::atomic(A::year_month_duration(1))],
    )
    .unwrap_err();
    assert_eq!(err, ErrorCode::XPTY0004);
}

#[rstest]
#[case("year-from-dateTime", A::integer(1999))]
#[case("month-from-dateTime", A::integer(5))]
#[case("day-from-dateTime", A::integer(31))]
#[case("hours-from-dateTime", A::integer(13))]
#[case("minutes-from-dateTime", A::integer(20))]
#[case("seconds-from-dateTime", A::decimal(Decimal::new(305, 1)))]
#[case("timezone-from-dateTime", hours(-5))]
fn date_time_components(#[case] name: &str, #[case] expected: A) {
    let input = v(AtomicType::DateTime, "1999-05-31T13:20:30.5-05:00");
    assert_eq!(call(name, &[input]).unwrap(), [expected]);
}

#[rstest]
fn date_and_time_components() {
    let date = v(AtomicType::Date, "2000-02-29");
    assert_eq!(call("year-from-date", &[date.clone()]).unwrap(), [A::integer(2000)]);
    assert_eq!(call("day-from-date", &[date.clone()]).unwrap(), [A::integer(29)]);
    assert!(call("timezone-from-date", &[date]).unwrap().is_empty());

    let time = v(AtomicType::Time, "23:59:00Z");
    assert_eq!(call("hours-from-time", &[time.clone()]).unwrap(), [A::integer(23)]);
    assert_eq!(call("seconds-from-time", &[time.clone()]).unwrap(), [A::decimal(Decimal::ZERO)]);
    assert_eq!(call("timezone-from-time", &[time]).unwrap(), [hours(0)]);

    assert!(call("year-from-date", &[Seq::empty()]).unwrap().is_empty());
    let mismatched = call("year-from-date", &[v(AtomicType::DateTime, "2000-01-01T00:00:00")]);
    assert_eq!(mismatched.unwrap_err(), ErrorCode::XPTY0004);
}

#[rstest]
#[case("years-from-duration", AtomicType::YearMonthDuration, "P20Y15M", A::integer(21))]
#[case("months-from-duration", AtomicType::YearMonthDuration, "P20Y15M", A::integer(3))]
#[case("years-from-duration", AtomicType::YearMonthDuration, "-P15M", A::integer(-1))]
#[case("months-from-duration", AtomicType::YearMonthDuration, "-P15M", A::integer(-3))]
#[case("years-from-duration", AtomicType::DayTimeDuration, "P3DT10H", A::integer(0))]
#[case("days-from-duration", AtomicType::DayTimeDuration, "P3DT10H", A::integer(3))]
#[case("days-from-duration", AtomicType::DayTimeDuration, "P3DT55H", A::integer(5))]
#[case("hours-from-duration", AtomicType::DayTimeDuration, "P3DT55H", A::integer(7))]
#[case("minutes-from-duration", AtomicType::DayTimeDuration, "-P5DT12H30M", A::integer(-30))]
#[case("seconds-from-duration", AtomicType::DayTimeDuration, "P3DT10H12.5S", A::decimal(Decimal::new(125, 1)))]
#[case("seconds-from-duration", AtomicType::DayTimeDuration, "-PT256S", A::decimal(Decimal::from(-16)))]
#[case("months-from-duration", AtomicType::Duration, "P1Y2M3D", A::integer(2))]
fn duration_components_carry_the_sign(
    #[case] name: &str,
    #[case] ty: AtomicType,
    #[case] input: &str,
    #[case] expected: A,
) {
    assert_eq!(call(name, &[v(ty, input)]).unwrap(), [expected]);
}

#[rstest]
fn duration_accessors_reject_other_types() {
    assert_eq!(call("days-from-duration", &[Seq::atomic(A::integer(3))]).unwrap_err(), ErrorCode::XPTY0004);
    assert!(call("days-from-duration", &[Seq::empty()]).unwrap().is_empty());
}

#[rstest]
fn moments_at_the_end_of_the_year_range() {
    // 23:00-14:00 on the last representable day is already past it in UTC.
    let last = value(AtomicType::DateTime, "262142-12-31T23:00:00-14:00");
    let earlier = value(AtomicType::DateTime, "262142-12-31T23:00:00Z");
    let ctx = CompareContext::default();
    assert_eq!(compare_atomic(&last, &last, &ctx, CompareFlags::EQUALITY).unwrap(), Comparison::Equal);
    assert_eq!(compare_atomic(&earlier, &last, &ctx, CompareFlags::ORDERING).unwrap(), Comparison::Less);

    let seq = Seq::from_atomics([last.clone(), earlier, last.clone()]);
    assert_eq!(distinct_values(&seq, ctx).item_count().unwrap(), 2);

    let err = call("adjust-dateTime-to-timezone", &[Seq::atomic(last.clone()), Seq::atomic(hours(14))]).unwrap_err();
    assert_eq!(err, ErrorCode::FODT0001);
    let same = call("adjust-dateTime-to-timezone", &[Seq::atomic(last.clone()), Seq::atomic(hours(-14))]).unwrap();
    assert_eq!(same, [last]);
}

#[rstest]
#[case(AtomicType::Date, "\n 2024-01-31\t", true)]
#[case(AtomicType::DateTime, " 2024-01-31T10:00:00Z\r\n", true)]
#[case(AtomicType::Date, "\u{a0}2024-01-31", false)]
#[case(AtomicType::Time, "10:00:00\u{2003}", false)]
#[case(AtomicType::DayTimeDuration, "\u{a0}PT1H", false)]
fn only_xml_whitespace_is_stripped(#[case] ty: AtomicType, #[case] lexical: &str, #[case] accepted: bool) {
    let cast = ty.cast(&A::string(lexical), &CastContext::default());
    assert_eq!(cast.is_ok(), accepted, "{lexical:?}");
    if let Err(err) = cast {
        assert_eq!(err.code_enum(), ErrorCode::FORG0001);
    }
}
