//! Atomic declaration blocks.
//!
//! A block collects entries and commits them together. Commit registers the
//! block's types, constructors and eliminators first so that everything in
//! the block can see everything else (mutual types), then validates every
//! entry. Any error truncates the context back to where the block started.

use tracing::debug;

use super::context::{Context, Entry};
use super::decl;
use super::error::{KernelError, NameError};

/// An open block over a context. Dropping it without committing discards
/// everything staged.
pub struct Block<'ctx> {
  ctx: &'ctx mut Context,
  staged: Vec<Entry>,
}

impl Context {
  pub fn begin_block(&mut self) -> Block<'_> {
    Block { ctx: self, staged: Vec::new() }
  }
}

impl Block<'_> {
  pub fn stage(&mut self, entry: Entry) -> Result<(), NameError> {
    self.ctx.check_fresh(&entry, &self.staged)?;
    self.staged.push(entry);
    Ok(())
  }

  pub fn staged(&self) -> &[Entry] {
    &self.staged
  }

  pub fn commit(self) -> Result<(), Vec<KernelError>> {
    let Block { ctx, staged } = self;
    let mark = ctx.len();
    let (named, keyed): (Vec<&Entry>, Vec<&Entry>) =
      staged.iter().partition(|e| e.declared_name().is_some());

    for entry in &named {
      ctx.install_named((*entry).clone());
    }
    let errors = decl::validate_block(ctx, &staged, mark);
    if !errors.is_empty() {
      ctx.truncate(mark);
      debug!(entries = staged.len(), errors = errors.len(), "block rolled back");
      return Err(errors);
    }
    for entry in keyed {
      ctx.install_keyed(entry.clone());
    }
    ctx.record_block(mark..ctx.len());
    debug!(entries = staged.len(), block = ctx.blocks.len(), "block committed");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::context::{EquationDecl, TypeDecl};
  use crate::kernel::error::{ErrorKind, TypeError};
  use crate::kernel::expr::{Term, Type};
  use crate::kernel::fixtures::*;
  use crate::kernel::name::Name;

  fn kinds(errors: &[KernelError]) -> Vec<ErrorKind> {
    errors.iter().map(KernelError::kind).collect()
  }

  #[test]
  fn duplicate_names_are_rejected_at_stage() {
    init_tracing();
    let mut ctx = Context::new();
    let mut block = ctx.begin_block();
    assert!(block.stage(ty("T", 0)).is_ok());
    assert_eq!(block.stage(ty("T", 1)), Err(NameError::Duplicate(Name::new("T"))));
    assert!(block.commit().is_ok());
    let mut block = ctx.begin_block();
    assert_eq!(block.stage(ctor("T", Type::base("T"))), Err(NameError::Duplicate(Name::new("T"))));
  }

  #[test]
  fn missing_equation_discards_the_whole_block() {
    init_tracing();
    let mut ctx = Context::new();
    commit(&mut ctx, bool_block()).expect("bool");
    let before = ctx.len();
    let entries: Vec<Entry> = nat_block()
      .into_iter()
      .filter(|e| {
        !matches!(e, Entry::Equation(eq) if eq.eliminator.as_str() == "ElimNat"
          && eq.constructor.as_str() == "Succ")
      })
      .collect();
    let errors = commit(&mut ctx, entries).expect_err("non-exhaustive");
    assert_eq!(errors, vec![KernelError::NonExhaustiveEquations {
      eliminator: Name::new("ElimNat"),
      missing: vec![Name::new("Succ")],
    }]);
    assert_eq!(ctx.len(), before);
    for name in ["Nat", "Zero", "Succ", "ElimNat", "IsZero"] {
      assert_eq!(ctx.lookup(&Name::new(name)), Err(NameError::Unknown(Name::new(name))));
    }
    assert!(ctx.equation(&Name::new("ElimNat"), &Name::new("Zero")).is_none());
    assert!(ctx.constructors_of(&Name::new("Nat")).is_empty());
  }

  #[test]
  fn overlapping_equations() {
    let mut ctx = Context::new();
    let mut entries = bool_block();
    entries.push(Entry::Equation(EquationDecl {
      eliminator: Name::new("Or"),
      constructor: Name::new("True"),
      bound_vars: vec![Name::new("z")],
      rhs: ff(),
    }));
    let errors = commit(&mut ctx, entries).expect_err("overlap");
    assert_eq!(kinds(&errors), vec![ErrorKind::OverlappingEquations]);
    assert!(ctx.is_empty());
  }

  #[test]
  fn equation_binders_must_match_fields_and_arguments() {
    let mut ctx = Context::new();
    commit(&mut ctx, bool_block()).expect("bool");
    let mut entries = nat_block();
    for e in &mut entries {
      if let Entry::Equation(eq) = e {
        if eq.eliminator.as_str() == "ElimNat" && eq.constructor.as_str() == "Succ" {
          eq.bound_vars.pop();
        }
      }
    }
    let errors = commit(&mut ctx, entries).expect_err("arity");
    assert_eq!(errors.len(), 1);
    assert!(matches!(
      &errors[0],
      KernelError::EquationArityMismatch { expected: 3, found: 2, .. }
    ));
  }

  #[test]
  fn ill_typed_rhs_is_reported() {
    let mut ctx = Context::new();
    commit(&mut ctx, bool_block()).expect("bool");
    let mut entries = nat_block();
    for e in &mut entries {
      if let Entry::Equation(eq) = e {
        if eq.eliminator.as_str() == "IsZero" && eq.constructor.as_str() == "Zero" {
          eq.rhs = zero();
        }
      }
    }
    let errors = commit(&mut ctx, entries).expect_err("rhs");
    assert_eq!(kinds(&errors), vec![ErrorKind::TypeMismatch]);
  }

  #[test]
  fn mutual_types_commit_together() -> anyhow::Result<()> {
    let mut ctx = Context::new();
    commit(&mut ctx, bool_block()).expect("bool");
    commit(&mut ctx, nat_block()).expect("nat");
    commit(&mut ctx, tree_forest_block()).expect("tree");
    assert_eq!(ctx.constructors_of(&Name::new("Forest")), &[Name::new("FNil"), Name::new("FCons")]);
    assert!(matches!(ctx.lookup(&Name::new("Node"))?, Entry::Constructor(_)));
    Ok(())
  }

  #[test]
  fn unresolved_reference_leaves_nothing_behind() {
    let mut ctx = Context::new();
    let entries: Vec<Entry> = vec![
      ty("Tree", 0),
      ctor("Node", Type::arrow(Type::base("Forest"), Type::base("Tree"))),
    ];
    let errors = commit(&mut ctx, entries).expect_err("unknown");
    assert_eq!(errors, vec![KernelError::Name(NameError::Unknown(Name::new("Forest")))]);
    for name in ["Tree", "Node", "Forest"] {
      assert!(ctx.lookup(&Name::new(name)).is_err());
    }
    assert_eq!(ctx.blocks().count(), 0);
  }

  #[test]
  fn committed_types_are_closed() {
    let mut ctx = std_context();
    let before = ctx.len();
    let extra = vec![ctor("Two", Type::base("Nat"))];
    let errors = commit(&mut ctx, extra).expect_err("closed");
    assert_eq!(kinds(&errors), vec![ErrorKind::AbstractionViolation]);
    assert_eq!(ctx.constructors_of(&Name::new("Nat")).len(), 2);
    let extra = vec![
      elim("Pred", Type::arrow(Type::base("Nat"), Type::base("Nat"))),
      eqn("Pred", "Zero", &[], zero()),
      eqn("Pred", "Succ", &["n"], Term::var("n")),
    ];
    let errors = commit(&mut ctx, extra).expect_err("closed");
    assert!(kinds(&errors).contains(&ErrorKind::AbstractionViolation));
    assert_eq!(ctx.len(), before);
  }

  #[test]
  fn constructor_results_must_be_distinct_parameters() {
    let mut ctx = Context::new();
    let entries = vec![
      Entry::Type(TypeDecl { name: Name::new("Pair"), arity: 2 }),
      ctor(
        "MkPair",
        Type::arrows(
          [Type::var("a"), Type::var("a")],
          Type::cnst("Pair", vec![Type::var("a"), Type::var("a")]),
        ),
      ),
    ];
    let errors = commit(&mut ctx, entries).expect_err("params");
    assert_eq!(kinds(&errors), vec![ErrorKind::Malformed]);
  }

  #[test]
  fn case_eliminator_needs_one_branch_per_constructor() {
    let mut ctx = Context::new();
    let mut entries = bool_block();
    entries.retain(|e| !matches!(e, Entry::Eliminator(el) if el.name.as_str() == "ElimBool"));
    entries.retain(|e| !matches!(e, Entry::Equation(eq) if eq.eliminator.as_str() == "ElimBool"));
    entries.push(elim("If1", Type::arrows([Type::base("Bool"), Type::var("a")], Type::var("a"))));
    entries.push(eqn("If1", "True", &["x"], Term::var("x")));
    entries.push(eqn("If1", "False", &["x"], Term::var("x")));
    let errors = commit(&mut ctx, entries).expect_err("branches");
    assert!(matches!(
      &errors[..],
      [KernelError::Type(TypeError::EliminatorArityMismatch { expected: 2, found: 1, .. })]
    ));
  }

  #[test]
  fn empty_type_with_case_eliminator_is_well_formed() {
    let mut ctx = Context::new();
    let entries = vec![
      ty("Void", 0),
      elim("Absurd", Type::arrow(Type::base("Void"), Type::var("a"))),
    ];
    assert!(commit(&mut ctx, entries).is_ok());
    assert!(ctx.constructors_of(&Name::new("Void")).is_empty());
  }

  #[test]
  fn abandoned_block_leaves_context_untouched() {
    let mut ctx = std_context();
    let before = ctx.len();
    {
      let mut block = ctx.begin_block();
      block.stage(ty("Ghost", 0)).expect("fresh");
    }
    assert_eq!(ctx.len(), before);
    assert!(!ctx.contains(&Name::new("Ghost")));
  }
}
