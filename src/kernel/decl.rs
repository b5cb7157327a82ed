//! Declaration-time validation of a block.
//!
//! Runs after the block's types, constructors and eliminators have been
//! registered, so entries may refer to each other regardless of order.

use rustc_hash::{FxHashMap, FxHashSet};

use super::context::{ConstructorDecl, Context, EliminatorDecl, Entry, EquationDecl};
use super::error::{KernelError, TcResult, TypeError};
use super::expr::{Type, TypeData};
use super::guard;
use super::name::Name;
use super::repr;
use super::tc::TypeChecker;

/// Validate every staged entry, collecting all errors. `mark` is the log
/// position the block was installed at.
pub fn validate_block(ctx: &Context, staged: &[Entry], mark: usize) -> Vec<KernelError> {
  let mut errors = Vec::new();
  for entry in staged {
    let res = match entry {
      Entry::Type(_) => Ok(()),
      Entry::Constructor(c) => check_constructor(ctx, c, mark),
      Entry::Eliminator(e) => check_eliminator(ctx, e, mark),
      Entry::Equation(eq) => check_equation(ctx, eq, mark),
      Entry::Representation(r) => repr::check_representation(ctx, r, mark),
      Entry::Impl(i) => repr::check_impl(ctx, i, staged),
    };
    if let Err(err) = res {
      errors.push(err);
    }
  }
  errors.extend(check_exhaustive(ctx, staged));
  errors.extend(repr::check_complete(ctx, staged));
  errors
}

/// The parameters a type is applied to, which must be distinct variables.
fn type_params(
  ctx: &Context,
  decl_name: &Name,
  owner: &Name,
  ty: &Type,
) -> TcResult<Vec<Name>> {
  let arity = ctx.type_decl(owner)?.arity;
  let args = match ty.as_data() {
    TypeData::Const(n, args) if n == owner => args,
    _ => {
      return Err(KernelError::malformed(decl_name, format!("expected {owner}, found {ty}")));
    },
  };
  if args.len() != arity {
    return Err(
      TypeError::TypeArityMismatch { name: owner.clone(), expected: arity, found: args.len() }
        .into(),
    );
  }
  let mut params = Vec::with_capacity(args.len());
  for a in args {
    match a.as_data() {
      TypeData::Var(v) if !params.contains(v) => params.push(v.clone()),
      _ => {
        return Err(KernelError::malformed(
          decl_name,
          format!("{ty} must apply {owner} to distinct type variables"),
        ));
      },
    }
  }
  Ok(params)
}

fn check_constructor(ctx: &Context, c: &ConstructorDecl, mark: usize) -> TcResult<()> {
  ctx.type_decl(&c.owning_type)?;
  guard::check_extension(ctx, &c.name, &c.owning_type, mark)?;
  let tc = TypeChecker::new(ctx);
  tc.check_type(&c.signature)?;
  let (fields, result) = c.signature.unfold_arrows();
  let params = type_params(ctx, &c.name, &c.owning_type, &result)?;
  for field in &fields {
    if let Some(v) = field.type_vars().into_iter().find(|v| !params.contains(v)) {
      return Err(KernelError::malformed(
        &c.name,
        format!("field {field} mentions {v}, which is not a parameter of {}", c.owning_type),
      ));
    }
  }
  Ok(())
}

/// Branch type expected of a case eliminator for `ctor`, given the
/// eliminator's scrutinee parameters and motive.
fn branch_shape(ctor: &ConstructorDecl, params: &[Name], motive: &Name) -> Type {
  let map: FxHashMap<Name, Type> =
    ctor.params().into_iter().zip(params.iter().map(|p| Type::var(p.clone()))).collect();
  let fields = ctor.fields().iter().map(|f| f.subst_vars(&map)).collect::<Vec<_>>();
  Type::arrows(fields, Type::var(motive.clone()))
}

fn check_eliminator(ctx: &Context, e: &EliminatorDecl, mark: usize) -> TcResult<()> {
  ctx.type_decl(&e.owning_type)?;
  guard::check_extension(ctx, &e.name, &e.owning_type, mark)?;
  let tc = TypeChecker::new(ctx);
  tc.check_type(&e.signature)?;
  let Some(scrutinee) = e.scrutinee() else {
    return Err(KernelError::malformed(&e.name, "eliminator takes no scrutinee"));
  };
  let params = type_params(ctx, &e.name, &e.owning_type, &scrutinee)?;
  let Some(motive) = &e.motive else {
    return Ok(());
  };
  if e.result() != Type::var(motive.clone()) || params.contains(motive) {
    return Err(KernelError::malformed(
      &e.name,
      format!("motive {motive} must be the result and not a parameter of {}", e.owning_type),
    ));
  }
  let branches = e.rest_args();
  let ctors = ctx.constructors_of(&e.owning_type);
  if branches.len() != ctors.len() {
    return Err(
      TypeError::EliminatorArityMismatch {
        eliminator: e.name.clone(),
        expected: ctors.len(),
        found: branches.len(),
      }
      .into(),
    );
  }
  for (i, (branch, ctor)) in branches.iter().zip(ctors).enumerate() {
    let expected = branch_shape(ctx.constructor(ctor)?, &params, motive);
    if *branch != expected {
      return Err(KernelError::malformed(
        &e.name,
        format!("branch {i} for {ctor} should be {expected}, found {branch}"),
      ));
    }
  }
  Ok(())
}

/// Types of an equation's bound variables: the constructor's fields at the
/// eliminator's scrutinee parameters, then the eliminator's other arguments.
pub fn equation_binders(elim: &EliminatorDecl, ctor: &ConstructorDecl) -> Vec<Type> {
  let scrutinee_args = match elim.scrutinee() {
    Some(s) => match s.as_data() {
      TypeData::Const(_, args) => args.clone(),
      _ => vec![],
    },
    None => vec![],
  };
  let map: FxHashMap<Name, Type> = ctor.params().into_iter().zip(scrutinee_args).collect();
  let mut binders: Vec<Type> = ctor.fields().iter().map(|f| f.subst_vars(&map)).collect();
  binders.extend(elim.rest_args());
  binders
}

fn check_equation(ctx: &Context, eq: &EquationDecl, mark: usize) -> TcResult<()> {
  let elim = ctx.eliminator(&eq.eliminator)?;
  let ctor = ctx.constructor(&eq.constructor)?;
  if ctor.owning_type != elim.owning_type {
    return Err(KernelError::malformed(
      &eq.eliminator,
      format!("{} is not a constructor of {}", eq.constructor, elim.owning_type),
    ));
  }
  guard::check_extension(ctx, &eq.eliminator, &elim.owning_type, mark)?;
  let binders = equation_binders(elim, ctor);
  if binders.len() != eq.bound_vars.len() {
    return Err(KernelError::EquationArityMismatch {
      eliminator: eq.eliminator.clone(),
      constructor: eq.constructor.clone(),
      expected: binders.len(),
      found: eq.bound_vars.len(),
    });
  }
  let mut seen = FxHashSet::default();
  if let Some(dup) = eq.bound_vars.iter().find(|v| !seen.insert(*v)) {
    return Err(KernelError::malformed(
      &eq.eliminator,
      format!("equation for {} binds {dup} twice", eq.constructor),
    ));
  }
  let mut tc = TypeChecker::new(ctx);
  for (v, ty) in eq.bound_vars.iter().zip(binders) {
    tc.push_local(v.clone(), ty);
  }
  tc.check(&eq.rhs, &elim.result())?;
  tc.finish()
}

/// Every eliminator declared in the block needs exactly one equation per
/// constructor of its type.
fn check_exhaustive(ctx: &Context, staged: &[Entry]) -> Vec<KernelError> {
  let mut counts: FxHashMap<(&Name, &Name), usize> = FxHashMap::default();
  for entry in staged {
    if let Entry::Equation(eq) = entry {
      *counts.entry((&eq.eliminator, &eq.constructor)).or_default() += 1;
    }
  }
  let mut errors = Vec::new();
  for entry in staged {
    let Entry::Eliminator(elim) = entry else {
      continue;
    };
    let mut missing = Vec::new();
    for ctor in ctx.constructors_of(&elim.owning_type) {
      match counts.get(&(&elim.name, ctor)).copied().unwrap_or(0) {
        0 => missing.push(ctor.clone()),
        1 => {},
        _ => errors.push(KernelError::OverlappingEquations {
          eliminator: elim.name.clone(),
          constructor: ctor.clone(),
        }),
      }
    }
    if !missing.is_empty() {
      errors.push(KernelError::NonExhaustiveEquations { eliminator: elim.name.clone(), missing });
    }
  }
  errors
}
