//! The closed-type barrier.
//!
//! Values of a declared type may only be built by its constructors and
//! taken apart by its eliminators. Everything else that would look inside
//! one (projections, primitive operations, another type's eliminator) is an
//! abstraction violation, and so is adding operations to a type after its
//! block has been committed.

use super::context::{Context, EliminatorDecl};
use super::error::KernelError;
use super::expr::{PrimOp, Type};
use super::name::Name;

/// The declared type `ty` is an instance of, if any.
pub fn contype<'a>(ctx: &Context, ty: &'a Type) -> Option<&'a Name> {
  match ty.head_const() {
    Some((name, _)) if ctx.is_type(name) => Some(name),
    _ => None,
  }
}

fn observers(ctx: &Context, type_name: &Name) -> String {
  let elims = ctx.eliminators_of(type_name);
  if elims.is_empty() {
    return format!("{type_name} has no eliminators");
  }
  let list: Vec<String> = elims.iter().map(Name::to_string).collect();
  format!("{type_name} is observable only through {}", list.join(", "))
}

pub fn violation(ctx: &Context, type_name: &Name, reason: impl AsRef<str>) -> KernelError {
  KernelError::AbstractionViolation {
    type_name: type_name.clone(),
    reason: format!("{}; {}", reason.as_ref(), observers(ctx, type_name)),
  }
}

pub fn check_primitive(ctx: &Context, op: PrimOp, arg_ty: &Type) -> Result<(), KernelError> {
  match contype(ctx, arg_ty) {
    Some(name) => {
      Err(violation(ctx, name, format!("primitive `{}` applied to a {name} value", op.symbol())))
    },
    None => Ok(()),
  }
}

pub fn check_projection(ctx: &Context, idx: usize, ty: &Type) -> Result<(), KernelError> {
  match contype(ctx, ty) {
    Some(name) => Err(violation(ctx, name, format!("projection .{idx} of a {name} value"))),
    None => Ok(()),
  }
}

pub fn check_eliminator(
  ctx: &Context,
  elim: &EliminatorDecl,
  scrutinee_ty: &Type,
) -> Result<(), KernelError> {
  match contype(ctx, scrutinee_ty) {
    Some(name) if *name != elim.owning_type => Err(violation(
      ctx,
      name,
      format!("eliminator {} of {} applied to a {name} value", elim.name, elim.owning_type),
    )),
    _ => Ok(()),
  }
}

/// Constructors, eliminators and equations may only be added in the block
/// that declares their type. `mark` is the log position the block started
/// at.
pub fn check_extension(
  ctx: &Context,
  op: &Name,
  owner: &Name,
  mark: usize,
) -> Result<(), KernelError> {
  match ctx.position(owner) {
    Some(pos) if pos < mark => {
      Err(violation(ctx, owner, format!("{op} extends {owner} after it was committed")))
    },
    _ => Ok(()),
  }
}
