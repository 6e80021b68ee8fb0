//! The `Type` half of the expression data model.
//!
//! Every [`Expr`](crate::expr::Expr) node carries one of these. Types are small, cheaply
//! cloned trees; sharing is via [`std::rc::Rc`] only where a type nests another type, so that
//! struct field lists don't get copied on every `Type::clone()`.

use std::rc::Rc;

/// A C/C++ type as seen by the resolver: primitives, pointers, arrays, structs/unions, code,
/// and fixed-length strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int { width: u32, signed: bool },
    Float,
    FixedBv { width: u32, integer_bits: u32 },
    Bool,
    Pointer(Rc<Type>),
    Array { elem: Rc<Type>, size: u64, infinite: bool },
    Struct { fields: Rc<Vec<StructField>>, is_class: bool },
    Union { fields: Rc<Vec<StructField>> },
    Code,
    /// A fixed-length string literal's type, e.g. the type of a `"foo"` constant. Laid out like
    /// `Array { elem: Int { width: 8, signed: true }, size: len, infinite: false }` for every
    /// purpose the Type-Layout Oracle cares about (see `layout::as_array_like`).
    StringLit { len: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

impl Type {
    pub fn int(width: u32, signed: bool) -> Type {
        Type::Int { width, signed }
    }

    pub fn pointer(to: Type) -> Type {
        Type::Pointer(Rc::new(to))
    }

    pub fn array(elem: Type, size: u64) -> Type {
        Type::Array { elem: Rc::new(elem), size, infinite: false }
    }

    pub fn infinite_array(elem: Type) -> Type {
        Type::Array { elem: Rc::new(elem), size: 0, infinite: true }
    }

    pub fn struct_of(fields: Vec<StructField>) -> Type {
        Type::Struct { fields: Rc::new(fields), is_class: false }
    }

    pub fn class_of(fields: Vec<StructField>) -> Type {
        Type::Struct { fields: Rc::new(fields), is_class: true }
    }

    pub fn union_of(fields: Vec<StructField>) -> Type {
        Type::Union { fields: Rc::new(fields) }
    }

    /// The bit width of a scalar type, used by `ByteExtract`/`Concat` sizing and by the
    /// "scalar subtype of same width" comparisons in the Reference Builder.
    ///
    /// Panics on non-scalar types: a caller asking a struct or array for its "width" has
    /// violated a precondition the IR-producing front end is responsible for upholding, not a
    /// recoverable error.
    pub fn width_bits(&self, cfg: &crate::config::LayoutConfig) -> u32 {
        match self {
            Type::Int { width, .. } => *width,
            Type::Bool => 8,
            Type::Float => 64,
            Type::FixedBv { width, .. } => *width,
            Type::Pointer(_) => cfg.pointer_width_bytes * 8,
            Type::Code => 0,
            other => panic!("width_bits called on non-scalar type {other:?}"),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Type::Int { .. } | Type::Bool | Type::Float | Type::FixedBv { .. } | Type::Pointer(_)
        )
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Type::Code)
    }

    pub fn is_string_lit(&self) -> bool {
        matches!(self, Type::StringLit { .. })
    }

    /// The type a pointer to `self` points at. Panics if `self` isn't `Pointer`.
    pub fn pointee(&self) -> &Type {
        match self {
            Type::Pointer(sub) => sub,
            other => panic!("pointee() called on non-pointer type {other:?}"),
        }
    }

    pub fn as_struct_fields(&self) -> &[StructField] {
        match self {
            Type::Struct { fields, .. } => fields,
            Type::Union { fields } => fields,
            other => panic!("as_struct_fields() called on non-struct type {other:?}"),
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Type::Struct { is_class: true, .. })
    }
}
