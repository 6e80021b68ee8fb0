//! The `Expr` half of the expression data model.
//!
//! Expressions are immutable, `Rc`-shared trees — the resolver is single-threaded, so `Rc` rather
//! than `Arc`. Rewriting builds new nodes and lets unreferenced ones drop; there is no mutation
//! through shared handles, so the "DAG with shared subterms" shape falls out for free from
//! ordinary `Rc::clone`.

use std::rc::Rc;

use crate::types::Type;

/// An expression node: a `Type` plus a tagged-union `ExprKind`. Cheap to clone (`Rc` bump).
#[derive(Debug, Clone, PartialEq)]
pub struct Expr(Rc<ExprNode>);

#[derive(Debug, PartialEq)]
pub struct ExprNode {
    pub ty: Type,
    pub kind: ExprKind,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    ConstInt(i128),
    ConstString(String),
    Symbol(String),
    NullObject,

    Add(Expr, Expr),
    Sub(Expr, Expr),
    Mul(Expr, Expr),
    Div(Expr, Expr),
    Mod(Expr, Expr),
    BitAnd(Expr, Expr),

    Equal(Expr, Expr),
    NotEqual(Expr, Expr),
    Lt(Expr, Expr),
    Le(Expr, Expr),
    Gt(Expr, Expr),
    Ge(Expr, Expr),

    /// Short-circuiting n-ary conjunction/disjunction.
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Expr),
    If(Expr, Expr, Expr),

    AddressOf(Expr),
    Dereference(Expr),
    Index(Expr, Expr),
    Member(Expr, String),

    Typecast(Expr),
    ByteExtract { source: Expr, offset: Expr, big_endian: bool },
    /// `hi` occupies the high-order bits of the result, `lo` the low-order bits.
    Concat(Expr, Expr),

    SameObject(Expr, Expr),
    InvalidPointer(Expr),
    ValidObject(Expr),
    PointerOffset(Expr),
}

impl Expr {
    pub fn new(ty: Type, kind: ExprKind) -> Expr {
        Expr(Rc::new(ExprNode { ty, kind }))
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // --- Smart constructors -------------------------------------------------------------
    //
    // One typed wrapper per variant: each constructor computes (or is handed) the node's own
    // type so call sites never have to derive it by hand.

    pub fn const_int(ty: Type, value: i128) -> Expr {
        Expr::new(ty, ExprKind::ConstInt(value))
    }

    pub fn const_string(value: impl Into<String>) -> Expr {
        let value = value.into();
        let len = value.len() as u64;
        Expr::new(Type::StringLit { len }, ExprKind::ConstString(value))
    }

    pub fn symbol(ty: Type, name: impl Into<String>) -> Expr {
        Expr::new(ty, ExprKind::Symbol(name.into()))
    }

    pub fn null_object(pointee: Type) -> Expr {
        Expr::new(Type::pointer(pointee), ExprKind::NullObject)
    }

    pub fn bool_lit(value: bool) -> Expr {
        Expr::const_int(Type::Bool, value as i128)
    }

    pub fn add(ty: Type, a: Expr, b: Expr) -> Expr {
        Expr::new(ty, ExprKind::Add(a, b))
    }

    pub fn sub(ty: Type, a: Expr, b: Expr) -> Expr {
        Expr::new(ty, ExprKind::Sub(a, b))
    }

    pub fn mul(ty: Type, a: Expr, b: Expr) -> Expr {
        Expr::new(ty, ExprKind::Mul(a, b))
    }

    pub fn div(ty: Type, a: Expr, b: Expr) -> Expr {
        Expr::new(ty, ExprKind::Div(a, b))
    }

    pub fn modulo(ty: Type, a: Expr, b: Expr) -> Expr {
        Expr::new(ty, ExprKind::Mod(a, b))
    }

    pub fn bitand(ty: Type, a: Expr, b: Expr) -> Expr {
        Expr::new(ty, ExprKind::BitAnd(a, b))
    }

    pub fn equal(a: Expr, b: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::Equal(a, b))
    }

    pub fn not_equal(a: Expr, b: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::NotEqual(a, b))
    }

    pub fn lt(a: Expr, b: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::Lt(a, b))
    }

    pub fn le(a: Expr, b: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::Le(a, b))
    }

    pub fn gt(a: Expr, b: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::Gt(a, b))
    }

    pub fn ge(a: Expr, b: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::Ge(a, b))
    }

    pub fn and(operands: Vec<Expr>) -> Expr {
        Expr::new(Type::Bool, ExprKind::And(operands))
    }

    pub fn or(operands: Vec<Expr>) -> Expr {
        Expr::new(Type::Bool, ExprKind::Or(operands))
    }

    pub fn not(e: Expr) -> Expr {
        match e.kind() {
            // Peephole: avoid `not(not(x))` chains piling up across guard pushes.
            ExprKind::Not(inner) => inner.clone(),
            _ => Expr::new(Type::Bool, ExprKind::Not(e)),
        }
    }

    pub fn if_then_else(ty: Type, cond: Expr, t: Expr, f: Expr) -> Expr {
        Expr::new(ty, ExprKind::If(cond, t, f))
    }

    pub fn address_of(e: Expr) -> Expr {
        let ty = Type::pointer(e.ty().clone());
        Expr::new(ty, ExprKind::AddressOf(e))
    }

    pub fn dereference(result_ty: Type, ptr: Expr) -> Expr {
        Expr::new(result_ty, ExprKind::Dereference(ptr))
    }

    pub fn index(elem_ty: Type, base: Expr, idx: Expr) -> Expr {
        Expr::new(elem_ty, ExprKind::Index(base, idx))
    }

    pub fn member(field_ty: Type, base: Expr, field: impl Into<String>) -> Expr {
        Expr::new(field_ty, ExprKind::Member(base, field.into()))
    }

    pub fn typecast(to: Type, e: Expr) -> Expr {
        if *e.ty() == to {
            return e;
        }
        Expr::new(to, ExprKind::Typecast(e))
    }

    pub fn byte_extract(result_ty: Type, source: Expr, offset: Expr, big_endian: bool) -> Expr {
        Expr::new(result_ty, ExprKind::ByteExtract { source, offset, big_endian })
    }

    pub fn concat(ty: Type, hi: Expr, lo: Expr) -> Expr {
        Expr::new(ty, ExprKind::Concat(hi, lo))
    }

    pub fn same_object(a: Expr, b: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::SameObject(a, b))
    }

    pub fn invalid_pointer(p: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::InvalidPointer(p))
    }

    pub fn valid_object(p: Expr) -> Expr {
        Expr::new(Type::Bool, ExprKind::ValidObject(p))
    }

    pub fn pointer_offset(index_ty: Type, p: Expr) -> Expr {
        Expr::new(index_ty, ExprKind::PointerOffset(p))
    }

    /// Fold a constant arithmetic subtree before an offset is substituted into a guard or
    /// compared against a bound. `None` when no local simplification applies; callers fall back
    /// to the unsimplified node.
    pub fn const_fold(&self) -> Option<i128> {
        match self.kind() {
            ExprKind::ConstInt(v) => Some(*v),
            ExprKind::Add(a, b) => Some(a.const_fold()? + b.const_fold()?),
            ExprKind::Sub(a, b) => Some(a.const_fold()? - b.const_fold()?),
            ExprKind::Mul(a, b) => Some(a.const_fold()? * b.const_fold()?),
            ExprKind::Div(a, b) => {
                let (a, b) = (a.const_fold()?, b.const_fold()?);
                if b == 0 { None } else { Some(a / b) }
            }
            ExprKind::Mod(a, b) => {
                let (a, b) = (a.const_fold()?, b.const_fold()?);
                if b == 0 { None } else { Some(a % b) }
            }
            _ => None,
        }
    }

    /// Whether the node has a statically-known constant integer value, after local folding. A
    /// dynamic-offset expression may still resolve to a compile-time constant once its subterms
    /// are folded.
    pub fn as_constant_offset(&self) -> Option<i128> {
        self.const_fold()
    }
}

/// Collect all free variables named by `Symbol` nodes, for property-test scaffolding that needs
/// to tell two generated expressions apart by the symbols they reference.
pub fn collect_symbols(e: &Expr, out: &mut Vec<String>) {
    match e.kind() {
        ExprKind::Symbol(name) => out.push(name.clone()),
        ExprKind::NullObject | ExprKind::ConstInt(_) | ExprKind::ConstString(_) => {}
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
        | ExprKind::SameObject(a, b) => {
            collect_symbols(a, out);
            collect_symbols(b, out);
        }
        ExprKind::And(xs) | ExprKind::Or(xs) => xs.iter().for_each(|x| collect_symbols(x, out)),
        ExprKind::Not(a)
        | ExprKind::AddressOf(a)
        | ExprKind::Dereference(a)
        | ExprKind::Member(a, _)
        | ExprKind::Typecast(a)
        | ExprKind::InvalidPointer(a)
        | ExprKind::ValidObject(a)
        | ExprKind::PointerOffset(a) => collect_symbols(a, out),
        ExprKind::If(c, t, f) => {
            collect_symbols(c, out);
            collect_symbols(t, out);
            collect_symbols(f, out);
        }
        ExprKind::ByteExtract { source, offset, .. } => {
            collect_symbols(source, out);
            collect_symbols(offset, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_fold_adds_constants() {
        let a = Expr::const_int(Type::int(32, true), 4);
        let b = Expr::const_int(Type::int(32, true), 5);
        let sum = Expr::add(Type::int(32, true), a, b);
        assert_eq!(sum.const_fold(), Some(9));
    }

    #[test]
    fn not_not_collapses() {
        let p = Expr::symbol(Type::Bool, "p");
        let nn = Expr::not(Expr::not(p.clone()));
        assert_eq!(nn, p);
    }

    #[test]
    fn typecast_to_same_type_is_identity() {
        let p = Expr::symbol(Type::int(32, true), "p");
        let cast = Expr::typecast(Type::int(32, true), p.clone());
        assert_eq!(cast, p);
    }
}
