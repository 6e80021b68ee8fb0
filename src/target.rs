//! The Target Resolver: folds a points-to set into a guarded case-split over per-target accesses
//! built by the Reference Builder.
//!
//! Null/unknown/invalid targets are handled right at the point each candidate is considered,
//! inline in the case-split loop, rather than filtered out of the points-to set beforehand.

use tracing::instrument;

use crate::config::LayoutConfig;
use crate::expr::Expr;
use crate::failure::{Category, FailureSink};
use crate::guard::GuardStack;
use crate::points_to::{PointsToOracle, PointsToTarget};
use crate::reference::{self, ScalarStep};
use crate::session::Session;
use crate::types::Type;

/// The access mode a dereference occurs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
    /// A `free()` of the pointed-to object; distinct from `Write` because only `Free` treats a
    /// non-dynamic target as a hard failure in the liveness check.
    Free,
}

/// Bundles the collaborators every resolution step needs: the counter/symbol-table `Session`,
/// the caller-supplied points-to and failure-sink trait objects, and the layout configuration.
/// Grouping these avoids threading four separate parameters through every recursive call in
/// `walker`/`target`/`reference`.
pub struct Ctx<'a> {
    pub session: &'a mut Session,
    pub oracle: &'a mut dyn PointsToOracle,
    pub sink: &'a mut dyn FailureSink,
    pub cfg: &'a LayoutConfig,
}

/// Resolve a dereference of `ptr` to a value of `want_type` (or, if `want_type` is `None`, the
/// type named by the back of `scalar_steps`). Queries the points-to oracle, then for each
/// candidate target either emits a null/invalid obligation or delegates to the Reference
/// Builder, folding the per-target results into a single guarded case-split expression.
#[instrument(level = "trace", skip(guard, scalar_steps, ctx))]
pub fn deref(
    ptr: &Expr,
    want_type: Option<&Type>,
    guard: &GuardStack,
    mode: Mode,
    scalar_steps: &[ScalarStep],
    ctx: &mut Ctx,
) -> Expr {
    let result_ty = want_type
        .cloned()
        .unwrap_or_else(|| scalar_steps.last().expect("deref: no want_type and empty scalar_steps").result_ty.clone());

    let pointer_ty = ptr.ty().clone();
    let targets = ctx.oracle.value_set(ptr, &pointer_ty);

    let mut acc: Option<Expr> = None;
    for target in &targets {
        match target {
            PointsToTarget::Unknown | PointsToTarget::Invalid => {
                let mut g = guard.clone();
                g.push(Expr::invalid_pointer(ptr.clone()));
                ctx.sink.emit(Category::PointerDereference, "invalid pointer", g.as_expr());
            }
            PointsToTarget::Descriptor(desc) if desc.is_null() => {
                let mut g = guard.clone();
                g.push(Expr::same_object(ptr.clone(), Expr::null_object(pointer_ty.pointee().clone())));
                ctx.sink.emit(Category::PointerDereference, "NULL pointer", g.as_expr());
            }
            PointsToTarget::Descriptor(desc) => {
                let (value, pointer_guard) =
                    reference::build_reference_to(desc, mode, ptr, &result_ty, guard, scalar_steps, ctx);
                if let Some(v) = value {
                    acc = Some(match acc {
                        None => v,
                        Some(prev) => Expr::if_then_else(result_ty.clone(), pointer_guard, v, prev),
                    });
                }
            }
        }
    }

    match acc {
        Some(v) => v,
        None => {
            let failed = ctx.session.make_failed_symbol(result_ty.clone());
            Expr::symbol(failed.ty, failed.name)
        }
    }
}
