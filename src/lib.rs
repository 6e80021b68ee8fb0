//! Symbolic pointer-dereference resolution for a bounded model checker's symbolic execution core:
//! given an expression tree possibly containing `Dereference` nodes plus an externally-supplied
//! may-points-to oracle, rewrite it into a dereference-free tree and a log of safety obligations
//! for a downstream solver to discharge.
//!
//! [`types`]/[`expr`] are the data model, [`config`]/[`session`]/[`guard`] are the ambient
//! machinery threaded through every call, [`points_to`]/[`failure`] are the two external
//! collaborator boundaries, [`layout`] is the pure memory-layout oracle, and
//! [`reference`]/[`target`]/[`walker`] are the three-stage resolution pipeline itself (innermost
//! to outermost).

mod config;
mod expr;
mod failure;
mod guard;
mod layout;
mod points_to;
mod reference;
mod session;
mod target;
mod types;
mod walker;

pub use config::{CheckConfig, Endianness, LayoutConfig, ResolverError};
pub use expr::{collect_symbols, Expr, ExprKind};
pub use failure::{Category, FailureSink, Obligation, ObligationLog};
pub use guard::GuardStack;
pub use points_to::{FixedOracle, ObjectDescriptor, PointsToOracle, PointsToTarget};
pub use reference::{ScalarStep, ScalarStepKind};
pub use session::{FreshSymbol, Session};
pub use target::{Ctx, Mode};
pub use types::{StructField, Type};
pub use walker::{has_dereference, resolve, rewrite};
