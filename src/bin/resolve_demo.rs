//! A small CLI harness exercising the resolver against a handful of canned expression trees.
//! Not part of the library's public contract; useful for eyeballing the obligations a given
//! pointer expression produces without wiring up a real symbolic-execution engine.

use deref_resolve::{
    resolve, Ctx, Expr, FixedOracle, LayoutConfig, Mode, ObjectDescriptor, ObligationLog,
    PointsToTarget, Session, StructField, Type,
};

fn linked_list_scenario() {
    let node_ty = Type::struct_of(vec![
        StructField { name: "value".into(), ty: Type::int(32, true) },
        StructField { name: "next".into(), ty: Type::pointer(Type::int(32, true)) },
    ]);
    let node = Expr::symbol(node_ty.clone(), "node0");

    let mut session = Session::new();
    let mut oracle = FixedOracle::new();
    oracle.register(
        "head",
        vec![PointsToTarget::Descriptor(ObjectDescriptor::new(node.clone(), None, 4))],
    );
    let mut sink = ObligationLog::new(Default::default());
    let cfg = LayoutConfig::default();
    let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };

    let head = Expr::symbol(Type::pointer(node_ty.clone()), "head");
    let access = Expr::member(Type::int(32, true), Expr::dereference(node_ty, head), "value");

    let rewritten = resolve(&access, Mode::Read, &mut ctx);
    println!("head->value  =>  {rewritten:#?}");
    println!("obligations: {:#?}", sink.obligations());
}

fn null_deref_scenario() {
    let mut session = Session::new();
    let mut oracle = FixedOracle::new();
    let mut sink = ObligationLog::new(Default::default());
    let cfg = LayoutConfig::default();
    let mut ctx = Ctx { session: &mut session, oracle: &mut oracle, sink: &mut sink, cfg: &cfg };

    let elem_ty = Type::int(32, true);
    let p = Expr::symbol(Type::pointer(elem_ty.clone()), "p");
    let access = Expr::dereference(elem_ty, p);

    let rewritten = resolve(&access, Mode::Read, &mut ctx);
    println!("*p (unknown p)  =>  {rewritten:#?}");
    println!("obligations: {:#?}", sink.obligations());
}

fn main() {
    tracing_subscriber::fmt::init();
    linked_list_scenario();
    println!();
    null_deref_scenario();
}
