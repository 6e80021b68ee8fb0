//! The Tree Walker: the single recursive descent that finds every `Dereference` node in an
//! expression and replaces it, bottom-up, with a dereference-free reconstruction, threading a
//! path guard through short-circuiting `&&`/`||`/`if` along the way.

use crate::expr::{Expr, ExprKind};
use crate::guard::GuardStack;
use crate::layout;
use crate::reference::ScalarStep;
use crate::target::{self, Ctx, Mode};
use crate::types::Type;

/// Whether `e` contains a `Dereference` node anywhere in its subtree. Consulted as a fast path
/// so a dereference-free subexpression is returned untouched (same `Rc`, via `Expr::clone`)
/// rather than rebuilt node-for-node.
pub fn has_dereference(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::ConstInt(_) | ExprKind::ConstString(_) | ExprKind::Symbol(_) | ExprKind::NullObject => false,
        ExprKind::Dereference(_) => true,
        ExprKind::Add(a, b)
        | ExprKind::Sub(a, b)
        | ExprKind::Mul(a, b)
        | ExprKind::Div(a, b)
        | ExprKind::Mod(a, b)
        | ExprKind::BitAnd(a, b)
        | ExprKind::Equal(a, b)
        | ExprKind::NotEqual(a, b)
        | ExprKind::Lt(a, b)
        | ExprKind::Le(a, b)
        | ExprKind::Gt(a, b)
        | ExprKind::Ge(a, b)
        | ExprKind::Index(a, b)
        | ExprKind::Concat(a, b)
        | ExprKind::SameObject(a, b) => has_dereference(a) || has_dereference(b),
        ExprKind::And(xs) | ExprKind::Or(xs) => xs.iter().any(has_dereference),
        ExprKind::Not(a)
        | ExprKind::AddressOf(a)
        | ExprKind::Member(a, _)
        | ExprKind::Typecast(a)
        | ExprKind::InvalidPointer(a)
        | ExprKind::ValidObject(a)
        | ExprKind::PointerOffset(a) => has_dereference(a),
        ExprKind::If(c, t, f) => has_dereference(c) || has_dereference(t) || has_dereference(f),
        ExprKind::ByteExtract { source, offset, .. } => has_dereference(source) || has_dereference(offset),
    }
}

/// Whether `e`, stripped of any Member/Index projections wrapping it, bottoms out at a
/// `Dereference`. Decides whether a Member/Index node folds into a scalar-step list for the
/// Reference Builder instead of recursing into its base independently.
fn base_is_dereference(e: &Expr) -> bool {
    match e.kind() {
        ExprKind::Dereference(_) => true,
        ExprKind::Member(base, _) | ExprKind::Index(base, _) => base_is_dereference(base),
        _ => false,
    }
}

fn innermost_dereference(e: &Expr) -> &Expr {
    match e.kind() {
        ExprKind::Dereference(_) => e,
        ExprKind::Member(base, _) | ExprKind::Index(base, _) => innermost_dereference(base),
        other => unreachable!("innermost_dereference: no dereference in chain, found {other:?}"),
    }
}

/// Rewrite every `Dereference` in `e` into a dereference-free expression, recording safety
/// obligations on `ctx.sink` guarded by `guard`'s current path condition.
pub fn rewrite(e: &Expr, guard: &mut GuardStack, mode: Mode, ctx: &mut Ctx) -> Expr {
    if !has_dereference(e) {
        return e.clone();
    }

    match e.kind() {
        ExprKind::Dereference(_) => rewrite_through_dereference(e, guard, mode, ctx),

        ExprKind::Member(base, _) | ExprKind::Index(base, _) if base_is_dereference(base) => {
            rewrite_through_dereference(e, guard, mode, ctx)
        }

        ExprKind::AddressOf(inner) => rewrite_address_of(e, inner, guard, ctx),

        ExprKind::And(xs) => rewrite_and(xs, guard, mode, ctx),
        ExprKind::Or(xs) => rewrite_or(xs, guard, mode, ctx),
        ExprKind::If(c, t, f) => rewrite_if(c, t, f, e.ty().clone(), guard, mode, ctx),

        ExprKind::Add(a, b) => Expr::add(e.ty().clone(), rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Sub(a, b) => Expr::sub(e.ty().clone(), rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Mul(a, b) => Expr::mul(e.ty().clone(), rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Div(a, b) => Expr::div(e.ty().clone(), rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Mod(a, b) => Expr::modulo(e.ty().clone(), rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::BitAnd(a, b) => {
            Expr::bitand(e.ty().clone(), rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx))
        }
        ExprKind::Equal(a, b) => Expr::equal(rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::NotEqual(a, b) => Expr::not_equal(rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Lt(a, b) => Expr::lt(rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Le(a, b) => Expr::le(rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Gt(a, b) => Expr::gt(rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Ge(a, b) => Expr::ge(rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Index(base, idx) => {
            let base_r = rewrite(base, guard, mode, ctx);
            let idx_r = rewrite(idx, guard, mode, ctx);
            Expr::index(e.ty().clone(), base_r, idx_r)
        }
        ExprKind::Member(base, field) => {
            let base_r = rewrite(base, guard, mode, ctx);
            Expr::member(e.ty().clone(), base_r, field.clone())
        }
        ExprKind::Concat(hi, lo) => {
            Expr::concat(e.ty().clone(), rewrite(hi, guard, mode, ctx), rewrite(lo, guard, mode, ctx))
        }
        ExprKind::SameObject(a, b) => Expr::same_object(rewrite(a, guard, mode, ctx), rewrite(b, guard, mode, ctx)),
        ExprKind::Not(a) => Expr::not(rewrite(a, guard, mode, ctx)),
        ExprKind::Typecast(a) => Expr::typecast(e.ty().clone(), rewrite(a, guard, mode, ctx)),
        ExprKind::ByteExtract { source, offset, big_endian } => Expr::byte_extract(
            e.ty().clone(),
            rewrite(source, guard, mode, ctx),
            rewrite(offset, guard, mode, ctx),
            *big_endian,
        ),
        ExprKind::InvalidPointer(a) => Expr::invalid_pointer(rewrite(a, guard, mode, ctx)),
        ExprKind::ValidObject(a) => Expr::valid_object(rewrite(a, guard, mode, ctx)),
        ExprKind::PointerOffset(a) => Expr::pointer_offset(e.ty().clone(), rewrite(a, guard, mode, ctx)),

        ExprKind::ConstInt(_) | ExprKind::ConstString(_) | ExprKind::Symbol(_) | ExprKind::NullObject => e.clone(),
    }
}

/// Walk down a Member/Index chain to its `Dereference` base, accumulating a scalar-step list
/// innermost-first, then hand the whole chain to the Target Resolver in one call instead of
/// dereferencing at the pointer's own type and re-wrapping with Member/Index afterwards.
fn rewrite_through_dereference(e: &Expr, guard: &mut GuardStack, mode: Mode, ctx: &mut Ctx) -> Expr {
    let mut steps = Vec::new();
    let mut cur = e;
    loop {
        match cur.kind() {
            ExprKind::Member(base, field) => {
                steps.push(ScalarStep::member(field.clone(), cur.ty().clone()));
                cur = base;
            }
            ExprKind::Index(base, idx) => {
                let idx_r = rewrite(idx, guard, mode, ctx);
                steps.push(ScalarStep::index(idx_r, cur.ty().clone()));
                cur = base;
            }
            ExprKind::Dereference(ptr) => {
                let ptr_r = rewrite(ptr, guard, Mode::Read, ctx);
                steps.reverse();
                return target::deref(&ptr_r, Some(e.ty().clone()), guard, mode, &steps, ctx);
            }
            other => unreachable!("rewrite_through_dereference: chain base is not a dereference, found {other:?}"),
        }
    }
}

/// `&*p` collapses to `p` with no validity check; `&p->field`/`&p->arr[i]` collapses to ordinary
/// pointer arithmetic over the rewritten base pointer, rather than dereferencing and re-taking
/// the address.
fn rewrite_address_of(e: &Expr, inner: &Expr, guard: &mut GuardStack, ctx: &mut Ctx) -> Expr {
    if let ExprKind::Dereference(ptr) = inner.kind() {
        return rewrite(ptr, guard, Mode::Read, ctx);
    }
    if base_is_dereference(inner) {
        let ExprKind::Dereference(ptr) = innermost_dereference(inner).kind() else {
            unreachable!("base_is_dereference guarantees a Dereference base")
        };
        let ptr_r = rewrite(ptr, guard, Mode::Read, ctx);
        let offset = layout::compute_pointer_offset(inner, ctx.cfg);
        return Expr::add(e.ty().clone(), ptr_r, offset);
    }
    Expr::address_of(rewrite(inner, guard, Mode::Read, ctx))
}

/// `a && b && ...`: each operand after the first is only evaluated on the path where every
/// earlier operand held, so its obligations are guarded by the conjunction of the (rewritten)
/// earlier operands.
fn rewrite_and(xs: &[Expr], guard: &mut GuardStack, mode: Mode, ctx: &mut Ctx) -> Expr {
    let mark = guard.mark();
    let mut out = Vec::with_capacity(xs.len());
    for x in xs {
        let x_r = rewrite(x, guard, mode, ctx);
        guard.push(x_r.clone());
        out.push(x_r);
    }
    guard.restore(mark);
    Expr::and(out)
}

/// `a || b || ...`: each operand after the first is only evaluated on the path where every
/// earlier operand failed, so its obligations are guarded by the conjunction of their negations.
fn rewrite_or(xs: &[Expr], guard: &mut GuardStack, mode: Mode, ctx: &mut Ctx) -> Expr {
    let mark = guard.mark();
    let mut out = Vec::with_capacity(xs.len());
    for x in xs {
        let x_r = rewrite(x, guard, mode, ctx);
        guard.push_negated(x_r.clone());
        out.push(x_r);
    }
    guard.restore(mark);
    Expr::or(out)
}

/// `c ? t : f`: `t` is only evaluated under `c`, `f` only under `!c`.
fn rewrite_if(c: &Expr, t: &Expr, f: &Expr, ty: Type, guard: &mut GuardStack, mode: Mode, ctx: &mut Ctx) -> Expr {
    let c_r = rewrite(c, guard, mode, ctx);
    let mark = guard.mark();

    guard.push(c_r.clone());
    let t_r = rewrite(t, guard, mode, ctx);
    guard.restore(mark);

    guard.push_negated(c_r.clone());
    let f_r = rewrite(f, guard, mode, ctx);
    guard.restore(mark);

    Expr::if_then_else(ty, c_r, t_r, f_r)
}

/// Rewrite `e` from a clean path condition. The entry point callers outside this module use;
/// internal recursion always threads an existing `GuardStack` instead.
pub fn resolve(e: &Expr, mode: Mode, ctx: &mut Ctx) -> Expr {
    let mut guard = GuardStack::new();
    rewrite(e, &mut guard, mode, ctx)
}
