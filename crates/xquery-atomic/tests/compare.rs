use std::cmp::Ordering;
use std::sync::Arc;

use chrono::FixedOffset;
use rstest::rstest;
use rust_decimal::Decimal;
use xquery_atomic::engine::collation::SimpleCaseCollation;
use xquery_atomic::xdm::compare::{ComparisonOp, compare_atomic, compare_for_order, distinct_equal, general_compare, value_compare};
use xquery_atomic::xdm::{CastContext, CompareContext, CompareFlags};
use xquery_atomic::{AtomicType as T, Comparison, ErrorCode, XdmAtomicValue as A};

fn ctx() -> CompareContext {
    CompareContext::default()
}

fn date_time(lexical: &str) -> A {
    T::DateTime.cast(&A::string(lexical), &CastContext::default()).unwrap()
}

#[rstest]
#[case(A::integer(1), A::double(1.0), Comparison::Equal)]
#[case(A::decimal(Decimal::new(15, 1)), A::float(1.25), Comparison::Greater)]
#[case(A::integer(2), A::typed_integer(T::Byte, 3).unwrap(), Comparison::Less)]
#[case(A::double(f64::NAN), A::double(f64::NAN), Comparison::Fail)]
#[case(A::string("abc"), A::any_uri("abd"), Comparison::Less)]
#[case(A::boolean(false), A::boolean(true), Comparison::Less)]
#[case(A::integer(1), A::string("1"), Comparison::Error)]
fn ordering_comparisons(#[case] a: A, #[case] b: A, #[case] expected: Comparison) {
    assert_eq!(compare_atomic(&a, &b, &ctx(), CompareFlags::ORDERING).unwrap(), expected);
}

#[rstest]
fn untyped_adopts_the_other_side() {
    let u = A::untyped("5");
    let d = A::double(5.0);
    let forward = compare_atomic(&u, &d, &ctx(), CompareFlags::ORDERING).unwrap();
    let backward = compare_atomic(&d, &u, &ctx(), CompareFlags::ORDERING).unwrap();
    assert_eq!(forward, Comparison::Equal);
    assert_eq!(forward, backward.reverse());

    // Two untyped operands compare as strings even when both look numeric.
    let lhs = A::untyped("10");
    let rhs = A::untyped("9");
    assert_eq!(compare_atomic(&lhs, &rhs, &ctx(), CompareFlags::ORDERING).unwrap(), Comparison::Less);
}

#[rstest]
fn untyped_that_is_not_a_number_fails_against_a_number() {
    let err = compare_atomic(&A::untyped("abc"), &A::double(1.0), &ctx(), CompareFlags::ORDERING).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0001);
}

#[rstest]
fn moments_compare_as_instants() {
    let a = date_time("2024-01-01T12:00:00+02:00");
    let b = date_time("2024-01-01T10:00:00Z");
    assert_eq!(compare_atomic(&a, &b, &ctx(), CompareFlags::EQUALITY).unwrap(), Comparison::Equal);

    let local = date_time("2024-01-01T10:00:00");
    let plus_one = CompareContext::new(ctx().collation, FixedOffset::east_opt(3600).unwrap());
    assert_eq!(compare_atomic(&local, &b, &plus_one, CompareFlags::ORDERING).unwrap(), Comparison::Less);
}

#[rstest]
fn general_durations_have_no_order() {
    let a = T::Duration.cast(&A::string("P1M"), &CastContext::default()).unwrap();
    let b = T::Duration.cast(&A::string("P30D"), &CastContext::default()).unwrap();
    assert_eq!(compare_atomic(&a, &b, &ctx(), CompareFlags::EQUALITY).unwrap(), Comparison::Fail);
    assert_eq!(compare_atomic(&a, &b, &ctx(), CompareFlags::ORDERING).unwrap(), Comparison::Error);
}

#[rstest]
fn collation_governs_string_equality() {
    let ci = CompareContext::new(Arc::new(SimpleCaseCollation), ctx().implicit_tz);
    assert!(value_compare(ComparisonOp::Eq, &A::string("Hello"), &A::string("hELLO"), &ci).unwrap());
    assert!(!value_compare(ComparisonOp::Eq, &A::string("Hello"), &A::string("hELLO"), &ctx()).unwrap());
}

#[rstest]
fn value_comparison_rejects_incomparable_types() {
    let err = value_compare(ComparisonOp::Lt, &A::integer(1), &A::boolean(true), &ctx()).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
fn general_comparison_is_existential() {
    let lhs = [A::integer(1), A::integer(5)];
    let rhs = [A::untyped("5"), A::untyped("7")];
    assert!(general_compare(ComparisonOp::Eq, &lhs, &rhs, &ctx()).unwrap());
    assert!(general_compare(ComparisonOp::Gt, &rhs, &lhs, &ctx()).unwrap());
    assert!(!general_compare(ComparisonOp::Gt, &lhs, &rhs, &ctx()).unwrap());
    assert!(!general_compare(ComparisonOp::Eq, &[], &rhs, &ctx()).unwrap());
}

#[rstest]
#[case(false, Ordering::Less)]
#[case(true, Ordering::Greater)]
fn empty_and_nan_sort_keys(#[case] empty_greatest: bool, #[case] expected: Ordering) {
    let one = A::integer(1);
    let nan = A::double(f64::NAN);
    assert_eq!(compare_for_order(None, Some(&one), &ctx(), empty_greatest).unwrap(), expected);
    assert_eq!(compare_for_order(Some(&nan), Some(&one), &ctx(), empty_greatest).unwrap(), expected);
    assert_eq!(compare_for_order(None, Some(&nan), &ctx(), empty_greatest).unwrap(), Ordering::Equal);
}

#[rstest]
fn distinct_equality_treats_nan_as_equal() {
    assert!(distinct_equal(&A::double(f64::NAN), &A::float(f32::NAN), &ctx()));
    assert!(distinct_equal(&A::integer(1), &A::decimal(Decimal::ONE), &ctx()));
    assert!(!distinct_equal(&A::integer(1), &A::string("1"), &ctx()));
}
