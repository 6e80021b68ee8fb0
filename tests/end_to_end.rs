//! End-to-end scenarios, adapted from the hand-written cases this resolver is expected to handle
//! (a linked list traversal, a union reached through two differently-typed pointers, `&*p`
//! collapsing, a NULL dereference, a byte buffer read as a wider scalar, and short-circuit
//! guarding of `&&`). Each drives the full `resolve` entry point rather than any one internal
//! stage.

use deref_resolve::{
    has_dereference, resolve, Category, Ctx, Expr, FixedOracle, LayoutConfig, Mode,
    ObjectDescriptor, ObligationLog, PointsToTarget, Session, StructField, Type,
};

fn harness() -> (Session, FixedOracle, ObligationLog, LayoutConfig) {
    (Session::new(), FixedOracle::new(), ObligationLog::new(Default::default()), LayoutConfig::default())
}

#[test]
fn linked_list_traversal_case_splits_over_both_nodes() {
    let node_ty = Type::struct_of(vec![
        StructField { name: "val".into(), ty: Type::int(32, true) },
        StructField { name: "next".into(), ty: Type::pointer(Type::int(32, true)) },
    ]);
    let item1 = Expr::symbol(node_ty.clone(), "item1");
    let item2 = Expr::symbol(node_ty.clone(), "item2");

    let (mut session, mut oracle, mut sink, cfg) = harness();
    oracle.register(
        "head",
        vec![
            PointsToTarget::Descriptor(ObjectDescriptor::new(item1, None, 4)),
            PointsToTarget::Descriptor(ObjectDescriptor::new(item2, None, 4)),
        ],
    );
    let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };

    let head = Expr::symbol(Type::pointer(node_ty.clone()), "head");
    let access = Expr::member(Type::int(32, true), Expr::dereference(node_ty, head), "val");

    let rewritten = resolve(&access, Mode::Read, &mut ctx);
    assert!(!has_dereference(&rewritten));
    assert!(matches!(rewritten.kind(), deref_resolve::ExprKind::If(..)));
    assert!(sink.obligations().is_empty());
}

#[test]
fn union_via_pointer_one_branch_is_out_of_bounds() {
    // struct { u16 bar[2]; u8 baz; } laid out packed: bar at 0..4, baz at 4, size 5.
    let s_ty = Type::struct_of(vec![
        StructField { name: "bar".into(), ty: Type::array(Type::int(16, false), 2) },
        StructField { name: "baz".into(), ty: Type::int(8, false) },
    ]);
    let obj = Expr::symbol(s_ty, "q_target");

    let (mut session, mut oracle, mut sink, cfg) = harness();
    // Two pointers into the same object: one at bar[0] (aligned, in-bounds as u16), one at baz
    // (byte 4, reading a u16 out of a 1-byte field runs past the struct's end).
    oracle.register("bar_ptr", vec![PointsToTarget::Descriptor(ObjectDescriptor::new(obj.clone(), Some(Expr::const_int(Type::int(64, false), 0)), 4))]);
    oracle.register("baz_ptr", vec![PointsToTarget::Descriptor(ObjectDescriptor::new(obj, Some(Expr::const_int(Type::int(64, false), 4)), 4))]);

    let u16_ty = Type::int(16, false);
    {
        let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };
        let bar_ptr = Expr::symbol(Type::pointer(u16_ty.clone()), "bar_ptr");
        let access = Expr::dereference(u16_ty.clone(), bar_ptr);
        let _ = resolve(&access, Mode::Read, &mut ctx);
    }
    assert!(sink.obligations().is_empty(), "aligned in-bounds read through bar must not obligate");

    {
        let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };
        let baz_ptr = Expr::symbol(Type::pointer(u16_ty.clone()), "baz_ptr");
        let access = Expr::dereference(u16_ty, baz_ptr);
        let _ = resolve(&access, Mode::Read, &mut ctx);
    }
    assert!(
        sink.obligations().iter().any(|o| o.category == Category::PointerDereference
            && (o.message == "Over-sized read of struct field" || o.message == "Access to object out of bounds")),
        "reading a u16 out of the trailing u8 field must run past the object's end: {:#?}",
        sink.obligations()
    );
}

#[test]
fn address_of_dereference_collapses_exactly() {
    let (mut session, mut oracle, mut sink, cfg) = harness();
    let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };

    let p = Expr::symbol(Type::pointer(Type::int(32, true)), "p");
    let e = Expr::address_of(Expr::dereference(Type::int(32, true), p.clone()));
    let rewritten = resolve(&e, Mode::Read, &mut ctx);

    assert_eq!(rewritten, p);
    assert!(sink.obligations().is_empty());
}

#[test]
fn null_dereference_emits_single_obligation_and_a_failed_symbol() {
    let (mut session, mut oracle, mut sink, cfg) = harness();
    let elem_ty = Type::int(32, true);
    oracle.register(
        "p",
        vec![PointsToTarget::Descriptor(ObjectDescriptor::new(Expr::null_object(elem_ty.clone()), None, 4))],
    );
    let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };

    let p = Expr::symbol(Type::pointer(elem_ty.clone()), "p");
    let access = Expr::dereference(elem_ty.clone(), p);
    let rewritten = resolve(&access, Mode::Read, &mut ctx);

    assert_eq!(*rewritten.ty(), elem_ty);
    assert!(matches!(rewritten.kind(), deref_resolve::ExprKind::Symbol(_)));
    assert_eq!(sink.obligations().len(), 1);
    assert_eq!(sink.obligations()[0].message, "NULL pointer");
}

#[test]
fn byte_buffer_read_as_wider_scalar_stitches_bytes() {
    let (mut session, mut oracle, mut sink, cfg) = harness();
    let buf = Expr::symbol(Type::array(Type::int(8, false), 8), "symex_dynamic::buf");
    // A symbolic (dynamic) offset, as a pointer derived from a heap allocation carries: the
    // constant-offset path only ever byte-extracts a single byte, so stitching requires the
    // offset to be unresolved at this point.
    let dyn_offset = Expr::symbol(Type::int(64, false), "off");
    oracle.register(
        "p",
        vec![PointsToTarget::Descriptor(ObjectDescriptor::new(buf, Some(dyn_offset), 1))],
    );
    let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };

    let int_ty = Type::int(32, true);
    let p = Expr::symbol(Type::pointer(int_ty.clone()), "p");
    let access = Expr::dereference(int_ty, p);
    let rewritten = resolve(&access, Mode::Read, &mut ctx);

    assert!(!has_dereference(&rewritten));
    // Byte-stitching builds a `Concat` chain of the four byte-array elements, then typecasts the
    // assembled (unsigned) width to the requested signed `int`.
    let deref_resolve::ExprKind::Typecast(inner) = rewritten.kind() else {
        panic!("expected a typecast wrapping the stitched concat chain, got {rewritten:?}");
    };
    assert!(matches!(inner.kind(), deref_resolve::ExprKind::Concat(..)));
}

#[test]
fn short_circuit_and_suppresses_obligation_on_the_false_path() {
    let (mut session, mut oracle, mut sink, cfg) = harness();
    let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };

    let int_ty = Type::int(32, true);
    let p = Expr::symbol(Type::pointer(int_ty.clone()), "p");
    let not_null = Expr::not_equal(p.clone(), Expr::null_object(int_ty.clone()));
    let eq_five = Expr::equal(Expr::dereference(int_ty.clone(), p), Expr::const_int(int_ty, 5));
    let guarded = Expr::and(vec![not_null.clone(), eq_five]);

    let rewritten = resolve(&guarded, Mode::Read, &mut ctx);
    assert!(!has_dereference(&rewritten));
    // p is unregistered, so the dereference resolves as unknown/invalid, guarded by not_null.
    assert_eq!(sink.obligations().len(), 1);
    let cond = &sink.obligations()[0].condition;
    assert!(format!("{cond:?}").contains("NotEqual"));
}
