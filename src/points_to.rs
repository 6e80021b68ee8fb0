//! The points-to data model and oracle interface.
//!
//! The resolver never computes a pointer's possible targets itself — it always goes through an
//! externally-supplied may-points-to analysis. `PointsToOracle` is that collaborator's trait
//! boundary.

use crate::expr::Expr;
use crate::types::Type;

/// One candidate object a pointer expression may point to, with the constant or symbolic offset
/// (in bytes) from the start of that object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    /// The object expression itself (typically a `Symbol` or a `NullObject` marker).
    pub object: Expr,
    /// The root object this descriptor was derived from — identical to `object` except when
    /// `object` denotes the null pointer's pointee, in which case `root_object` is the
    /// `NullObject` sentinel so callers can special-case it without re-deriving it.
    pub root_object: Expr,
    /// Byte offset of the pointed-to location within `object`, if known.
    pub offset: Option<Expr>,
    /// Known alignment of `object`, in bytes (a non-zero power of two). Consulted by the
    /// Reference Builder's dynamic-offset array path to decide whether an index can be taken
    /// directly or must fall back to byte-stitching.
    pub alignment: u64,
}

impl ObjectDescriptor {
    pub fn new(object: Expr, offset: Option<Expr>, alignment: u64) -> ObjectDescriptor {
        ObjectDescriptor { root_object: object.clone(), object, offset, alignment }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.root_object.kind(), crate::expr::ExprKind::NullObject)
    }
}

/// One element of a may-points-to set: either a candidate object, or one of two sentinel
/// outcomes that also need handling at a dereference site.
#[derive(Debug, Clone, PartialEq)]
pub enum PointsToTarget {
    Descriptor(ObjectDescriptor),
    /// The points-to analysis could not determine any candidate object for this pointer.
    Unknown,
    /// The pointer is known to have been invalidated (freed, out of scope, etc).
    Invalid,
}

/// External collaborator supplying may-points-to sets for pointer expressions. A real
/// bounded model checker backs this with its symbolic-execution value-set analysis; this crate
/// only consumes the trait.
pub trait PointsToOracle {
    /// The set of objects `pointer` may refer to, given `pointer`'s static type. Order is
    /// preserved in the resulting case-split: the Target Resolver builds its if-then-else
    /// chain in the order the oracle returns candidates.
    fn value_set(&mut self, pointer: &Expr, pointer_ty: &Type) -> Vec<PointsToTarget>;
}

/// A fixed-table oracle for tests and the demo binary: returns a pre-registered points-to set for
/// each pointer symbol name, or `Unknown` for anything not registered.
#[derive(Debug, Default)]
pub struct FixedOracle {
    table: std::collections::HashMap<String, Vec<PointsToTarget>>,
}

impl FixedOracle {
    pub fn new() -> FixedOracle {
        FixedOracle::default()
    }

    pub fn register(&mut self, pointer_symbol: impl Into<String>, targets: Vec<PointsToTarget>) {
        self.table.insert(pointer_symbol.into(), targets);
    }
}

impl PointsToOracle for FixedOracle {
    fn value_set(&mut self, pointer: &Expr, _pointer_ty: &Type) -> Vec<PointsToTarget> {
        match pointer.kind() {
            crate::expr::ExprKind::Symbol(name) => {
                self.table.get(name).cloned().unwrap_or(vec![PointsToTarget::Unknown])
            }
            _ => vec![PointsToTarget::Unknown],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_oracle_returns_registered_set() {
        let mut oracle = FixedOracle::new();
        let obj = Expr::symbol(Type::int(32, true), "x");
        oracle.register("p", vec![PointsToTarget::Descriptor(ObjectDescriptor::new(obj, None, 4))]);
        let p = Expr::symbol(Type::pointer(Type::int(32, true)), "p");
        let set = oracle.value_set(&p, p.ty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn unregistered_pointer_is_unknown() {
        let mut oracle = FixedOracle::new();
        let p = Expr::symbol(Type::pointer(Type::int(32, true)), "q");
        let set = oracle.value_set(&p, p.ty());
        assert_eq!(set, vec![PointsToTarget::Unknown]);
    }
}
