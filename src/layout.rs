//! The Type-Layout Oracle: pure functions over `Type`, no side effects, no failure modes beyond
//! the documented panics on malformed input — those are precondition violations, not recoverable
//! errors.

use crate::config::LayoutConfig;
use crate::expr::{Expr, ExprKind};
use crate::types::{StructField, Type};

/// Size of `ty` in bytes. Power-of-two for primitives per their bit width; element count times
/// element size for arrays; sum of field sizes (no padding — this crate's IR carries no explicit
/// padding fields, so struct layout is always packed) for structs; the widest field for unions.
pub fn sizeof(ty: &Type, cfg: &LayoutConfig) -> u64 {
    match ty {
        Type::Int { width, .. } | Type::FixedBv { width, .. } => (*width as u64 + 7) / 8,
        Type::Bool => 1,
        Type::Float => 8,
        Type::Pointer(_) => cfg.pointer_width_bytes as u64,
        Type::Code => 0,
        Type::Array { elem, size, infinite } => {
            assert!(!infinite, "sizeof() called on an infinite-size array");
            sizeof(elem, cfg) * size
        }
        Type::StringLit { len } => *len,
        Type::Struct { fields, .. } => fields.iter().map(|f| sizeof(&f.ty, cfg)).sum(),
        Type::Union { fields } => fields.iter().map(|f| sizeof(&f.ty, cfg)).max().unwrap_or(0),
    }
}

/// Byte offset of `field` within `fields`, assuming packed layout (see `sizeof`'s struct case).
/// Panics if no field with that name exists — a front-end contract violation, not a user error.
pub fn offset_of(fields: &[StructField], field: &str, cfg: &LayoutConfig) -> u64 {
    let mut offset = 0u64;
    for f in fields {
        if f.name == field {
            return offset;
        }
        offset += sizeof(&f.ty, cfg);
    }
    panic!("offset_of: no field named {field:?} in struct");
}

/// The field covering byte `offset`, along with its own start offset, or `None` past the end.
pub fn field_at_offset<'a>(
    fields: &'a [StructField],
    offset: u64,
    cfg: &LayoutConfig,
) -> Option<(&'a StructField, u64)> {
    let mut cur = 0u64;
    for f in fields {
        let size = sizeof(&f.ty, cfg);
        if offset < cur + size {
            return Some((f, cur));
        }
        cur += size;
    }
    None
}

/// Whether `s1`'s fields are a leading prefix of `s2`'s fields (same names and types, in order).
pub fn is_prefix_of(s1: &Type, s2: &Type) -> bool {
    let (Type::Struct { fields: f1, .. } | Type::Union { fields: f1 }) = s1 else { return false };
    let (Type::Struct { fields: f2, .. } | Type::Union { fields: f2 }) = s2 else { return false };
    if f1.len() > f2.len() {
        return false;
    }
    f1.iter().zip(f2.iter()).all(|(a, b)| a.name == b.name && a.ty == b.ty)
}

/// Whether `child` is a subclass of `parent`: both must be `Type::Struct { is_class: true, .. }`,
/// and `parent`'s fields must be a leading prefix of `child`'s — this crate's `Type` carries no
/// separate base-class pointer, so the C++ base-subobject-as-leading-fields convention doubles as
/// the subclass test.
pub fn is_subclass_of(child: &Type, parent: &Type) -> bool {
    child.is_class() && parent.is_class() && is_prefix_of(parent, child)
}

/// Two struct/union types are interchangeable for a reference cast: either is a subclass of the
/// other, or one is a structural prefix of the other. The caller is responsible for inserting the
/// typecast itself once this returns true.
pub fn types_compatible(object_ty: &Type, target_ty: &Type) -> bool {
    if object_ty.is_struct() && target_ty.is_struct() {
        if is_subclass_of(object_ty, target_ty) || is_subclass_of(target_ty, object_ty) {
            return true;
        }
    }
    is_prefix_of(target_ty, object_ty) || is_prefix_of(object_ty, target_ty)
}

/// Round `value` up to the next multiple of `unit` (`unit` a power of two), used to widen dynamic
/// struct-field windows to `word_size`.
pub fn round_up(value: u64, unit: u64) -> u64 {
    debug_assert!(unit.is_power_of_two());
    (value + unit - 1) & !(unit - 1)
}

/// Fold a chain of `Member`/`Index` projections sitting atop `expr` into a single arithmetic byte
/// offset expression. Constant-foldable when every index along the way is constant.
pub fn compute_pointer_offset(expr: &Expr, cfg: &LayoutConfig) -> Expr {
    match expr.kind() {
        ExprKind::Member(base, field) => {
            let base_offset = compute_pointer_offset(base, cfg);
            let fields = base.ty().as_struct_fields();
            let field_offset = offset_of(fields, field, cfg);
            add_offset(base_offset, field_offset as i128)
        }
        ExprKind::Index(base, idx) => {
            let base_offset = compute_pointer_offset(base, cfg);
            let elem_ty = match base.ty() {
                Type::Array { elem, .. } => elem.as_ref().clone(),
                Type::StringLit { .. } => Type::int(8, true),
                other => panic!("compute_pointer_offset: index base is non-array type {other:?}"),
            };
            let elem_size = sizeof(&elem_ty, cfg) as i128;
            match idx.const_fold() {
                Some(i) => add_offset(base_offset, i * elem_size),
                None => {
                    let byte_idx = Expr::mul(
                        idx.ty().clone(),
                        idx.clone(),
                        Expr::const_int(idx.ty().clone(), elem_size),
                    );
                    Expr::add(byte_idx.ty().clone(), base_offset, byte_idx)
                }
            }
        }
        _ => Expr::const_int(Type::int(64, false), 0),
    }
}

/// Add a constant `delta` to `base`, constant-folding when possible. Shared by
/// `compute_pointer_offset` and the Reference Builder's byte-stitching loop.
pub fn add_offset(base: Expr, delta: i128) -> Expr {
    match base.const_fold() {
        Some(v) => Expr::const_int(base.ty().clone(), v + delta),
        None => Expr::add(base.ty().clone(), base, Expr::const_int(base.ty().clone(), delta)),
    }
}
