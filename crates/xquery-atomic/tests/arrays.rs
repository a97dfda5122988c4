use rstest::rstest;
use xquery_atomic::interop::HostValue;
use xquery_atomic::model::simple::SimpleNode;
use xquery_atomic::xdm::{ItemArray, ObjectArray, PrimitiveArray};
use xquery_atomic::{AtomicType, ErrorCode, XdmAtomicValue as A, XdmItem, XdmSequenceStream};

fn item(i: usize) -> XdmItem<SimpleNode> {
    XdmItem::Atomic(A::integer(i128::try_from(i).unwrap()))
}

fn atoms(seq: XdmSequenceStream<SimpleNode>) -> Vec<A> {
    seq.map(|i| i.unwrap().as_atomic().cloned().unwrap()).collect()
}

#[rstest]
fn growth_past_the_block_size_overflows_and_packs_in_order() {
    let mut array = ItemArray::with_block_size(4);
    for i in 0..20 {
        array.push(item(i));
    }
    assert_eq!(array.len(), 20);
    assert!(array.overflow_blocks() >= 3);
    assert!(!array.is_packed());

    let streamed: Vec<_> = array.iter().cloned().collect();
    array.pack();
    assert!(array.is_packed());
    assert_eq!(array.overflow_blocks(), 0);
    assert_eq!(array.len(), 20);
    assert_eq!(array.as_slice(), streamed.as_slice());
    assert_eq!(streamed, (0..20).map(item).collect::<Vec<_>>());
}

#[rstest]
fn positional_access_packs_first() {
    let mut array: ItemArray<SimpleNode> = (0..10).map(item).collect();
    assert_eq!(array.get(1), Some(&item(0)));
    assert_eq!(array.get(10), Some(&item(9)));
    assert_eq!(array.get(0), None);
    assert_eq!(array.get(11), None);

    let mut small = ItemArray::with_block_size(2);
    small.extend((0..7).map(item));
    assert_eq!(small.get(5), Some(&item(4)));
    assert!(small.is_packed());
}

#[rstest]
fn packing_an_unoverflowed_array_is_a_no_op() {
    let mut array = ItemArray::with_block_size(64);
    array.extend((0..5).map(item));
    assert!(array.is_packed());
    array.pack();
    assert_eq!(array.as_slice().len(), 5);
}

#[rstest]
fn into_stream_exposes_a_quick_count() {
    let mut array = ItemArray::with_block_size(3);
    array.extend((0..8).map(item));
    let seq = array.into_stream();
    assert_eq!(seq.item_count().unwrap(), 8);
    assert_eq!(seq.item_at(8).unwrap(), Some(item(7)));
    assert_eq!(atoms(seq).len(), 8);

    assert!(ItemArray::<SimpleNode>::new().into_stream().is_empty().unwrap());
}

#[rstest]
fn primitive_arrays_carry_their_element_type() {
    let ints = PrimitiveArray::new(vec![1i32, -2, 3]).into_stream::<SimpleNode>();
    assert_eq!(ints.item_count().unwrap(), 3);
    assert_eq!(ints.item_at(2).unwrap(), Some(XdmItem::Atomic(A::Integer { ty: AtomicType::Int, value: -2 })));
    let again = ints.clone();
    assert_eq!(atoms(ints), atoms(again));

    let flags = atoms(PrimitiveArray::new(vec![true, false]).into_stream());
    assert_eq!(flags, [A::boolean(true), A::boolean(false)]);

    let chars = atoms(PrimitiveArray::new(vec!['a', 'b']).into_stream());
    assert_eq!(chars, [A::string("a"), A::string("b")]);
}

#[rstest]
fn object_arrays_skip_nulls_and_convert_lazily() {
    let values = vec![HostValue::I64(1), HostValue::Null, HostValue::Str("2".into())];
    let seq = ObjectArray::new(values, AtomicType::Integer).into_stream::<SimpleNode>();
    assert_eq!(seq.item_count().unwrap(), 2);
    assert_eq!(seq.item_at(2).unwrap(), Some(XdmItem::Atomic(A::integer(2))));
    // Values already of a subtype keep their own type.
    assert_eq!(atoms(seq), [A::Integer { ty: AtomicType::Long, value: 1 }, A::integer(2)]);
}

#[rstest]
fn object_array_conversion_errors_surface_at_the_element() {
    let values = vec![HostValue::I64(1), HostValue::Str("nope".into())];
    let mut seq = ObjectArray::new(values, AtomicType::Integer).into_stream::<SimpleNode>();
    assert!(seq.next().unwrap().is_ok());
    let err = seq.next().unwrap().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}
