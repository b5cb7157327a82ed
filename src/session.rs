//! The declaration and query surface.
//!
//! A `Session` owns a committed context and the block currently being
//! staged. Declarations go into the open block and become visible to queries
//! only once `commit_block` succeeds.

use tracing::debug;

use crate::kernel::config::KernelConfig;
use crate::kernel::context::{
  Backing, ConstructorDecl, Context, EliminatorDecl, Entry, EquationDecl, OperationImpl,
  RepresentationDecl, TypeDecl,
};
use crate::kernel::def_eq::is_definitionally_equal;
use crate::kernel::error::{KernelError, TcResult};
use crate::kernel::expr::{Literal, Term, Type};
use crate::kernel::name::Name;
use crate::kernel::repr::{FaithfulnessMode, FaithfulnessReport, check_faithfulness};
use crate::kernel::tc::type_of;
use crate::kernel::whnf::normalize;
use crate::store;

#[derive(Debug, Clone, Default)]
pub struct Session {
  ctx: Context,
  pending: Vec<Entry>,
  config: KernelConfig,
}

impl Session {
  pub fn new() -> Self {
    Session::default()
  }

  pub fn with_config(config: KernelConfig) -> Self {
    Session { config, ..Session::default() }
  }

  pub fn config(&self) -> &KernelConfig {
    &self.config
  }

  /// The committed context. Staged entries are not part of it.
  pub fn context(&self) -> &Context {
    &self.ctx
  }

  pub fn pending(&self) -> &[Entry] {
    &self.pending
  }

  fn stage(&mut self, entry: Entry) -> Result<(), KernelError> {
    self.ctx.check_fresh(&entry, &self.pending)?;
    self.pending.push(entry);
    Ok(())
  }

  // ==========================================================================
  // Declarations
  // ==========================================================================

  pub fn declare_type(&mut self, name: impl Into<Name>, arity: usize) -> Result<(), KernelError> {
    self.stage(Entry::Type(TypeDecl { name: name.into(), arity }))
  }

  /// The owning type is the head of the signature's result.
  pub fn declare_constructor(
    &mut self,
    name: impl Into<Name>,
    signature: Type,
  ) -> Result<(), KernelError> {
    let decl = ConstructorDecl::from_signature(name, signature)?;
    self.stage(Entry::Constructor(decl))
  }

  /// The owning type is the head of the first argument.
  pub fn declare_eliminator(
    &mut self,
    name: impl Into<Name>,
    signature: Type,
  ) -> Result<(), KernelError> {
    let decl = EliminatorDecl::from_signature(name, signature)?;
    self.stage(Entry::Eliminator(decl))
  }

  pub fn declare_equation<N: Into<Name>>(
    &mut self,
    eliminator: impl Into<Name>,
    constructor: impl Into<Name>,
    bound_vars: impl IntoIterator<Item = N>,
    rhs: Term,
  ) -> Result<(), KernelError> {
    self.stage(Entry::Equation(EquationDecl {
      eliminator: eliminator.into(),
      constructor: constructor.into(),
      bound_vars: bound_vars.into_iter().map(Into::into).collect(),
      rhs,
    }))
  }

  pub fn declare_representation(
    &mut self,
    type_name: impl Into<Name>,
    backing: Backing,
  ) -> Result<(), KernelError> {
    self.stage(Entry::Representation(RepresentationDecl { type_name: type_name.into(), backing }))
  }

  pub fn declare_operation_impl(
    &mut self,
    op: impl Into<Name>,
    expr: Term,
  ) -> Result<(), KernelError> {
    self.stage(Entry::Impl(OperationImpl { op: op.into(), expr }))
  }

  /// Validate and install the staged block. On failure nothing is
  /// installed and the staged entries are dropped.
  pub fn commit_block(&mut self) -> Result<(), Vec<KernelError>> {
    let staged = std::mem::take(&mut self.pending);
    let mut block = self.ctx.begin_block();
    for entry in staged {
      block.stage(entry).map_err(|e| vec![e.into()])?;
    }
    block.commit()
  }

  pub fn abandon_block(&mut self) {
    debug!(entries = self.pending.len(), "block abandoned");
    self.pending.clear();
  }

  // ==========================================================================
  // Queries
  // ==========================================================================

  pub fn type_of(&self, term: &Term) -> TcResult<Type> {
    type_of(&self.ctx, term)
  }

  pub fn normalize(&self, term: &Term, fuel: u64) -> TcResult<Term> {
    normalize(&self.ctx, term, fuel)
  }

  pub fn is_definitionally_equal(&self, a: &Term, b: &Term) -> TcResult<bool> {
    is_definitionally_equal(&self.ctx, a, b, self.config.fuel)
  }

  pub fn check_faithfulness(
    &self,
    type_name: impl Into<Name>,
    mode: FaithfulnessMode,
    samples: &[Literal],
  ) -> TcResult<FaithfulnessReport> {
    check_faithfulness(&self.ctx, &self.config, &type_name.into(), mode, samples)
  }

  // ==========================================================================
  // Persistence
  // ==========================================================================

  /// Encode the committed blocks. Staged entries are not saved.
  pub fn save(&self) -> Vec<u8> {
    store::to_bytes(&self.ctx)
  }

  pub fn load(bytes: &[u8], config: KernelConfig) -> Result<Self, KernelError> {
    let ctx = store::from_bytes(bytes)?;
    Ok(Session { ctx, pending: Vec::new(), config })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::error::{ErrorKind, NameError};
  use crate::kernel::fixtures::{
    bool_block, bool_ty, ff, init_tracing, nat, num, succ, succ_as_increment, tt, zero,
  };
  use crate::kernel::repr::EquationVerdict;

  fn declare(s: &mut Session, entries: Vec<Entry>) -> Result<(), KernelError> {
    for e in entries {
      match e {
        Entry::Type(t) => s.declare_type(t.name, t.arity)?,
        Entry::Constructor(c) => s.declare_constructor(c.name, c.signature)?,
        Entry::Eliminator(e) => s.declare_eliminator(e.name, e.signature)?,
        Entry::Equation(eq) => {
          s.declare_equation(eq.eliminator, eq.constructor, eq.bound_vars, eq.rhs)?
        },
        Entry::Representation(r) => s.declare_representation(r.type_name, r.backing)?,
        Entry::Impl(i) => s.declare_operation_impl(i.op, i.expr)?,
      }
    }
    Ok(())
  }

  /// `Bool` and a `Nat` with its case eliminator, declared through the
  /// session API.
  fn nat_session() -> anyhow::Result<Session> {
    let mut s = Session::new();
    declare(&mut s, bool_block())?;
    s.commit_block().map_err(|e| anyhow::anyhow!("{e:?}"))?;

    let a = Type::var("a");
    s.declare_type("Nat", 0)?;
    s.declare_constructor("Zero", nat())?;
    s.declare_constructor("Succ", Type::arrow(nat(), nat()))?;
    s.declare_eliminator(
      "ElimNat",
      Type::arrows([nat(), a.clone(), Type::arrow(nat(), a.clone())], a),
    )?;
    s.declare_equation("ElimNat", "Zero", ["x", "f"], Term::var("x"))?;
    s.declare_equation(
      "ElimNat",
      "Succ",
      ["n", "x", "f"],
      Term::app(Term::var("f"), Term::var("n")),
    )?;
    s.commit_block().map_err(|e| anyhow::anyhow!("{e:?}"))?;
    Ok(s)
  }

  fn nat_as_int(s: &mut Session, succ_impl: Term) -> anyhow::Result<()> {
    let elim_impl = Term::lam(
      "n",
      Term::lam(
        "x",
        Term::lam(
          "f",
          Term::if_(
            Term::eq(Term::var("n"), Term::int(0)),
            Term::var("x"),
            Term::app(Term::var("f"), Term::sub(Term::var("n"), Term::int(1))),
          ),
        ),
      ),
    );
    s.declare_representation("Nat", Backing::Int)?;
    s.declare_operation_impl("Zero", Term::int(0))?;
    s.declare_operation_impl("Succ", succ_impl)?;
    s.declare_operation_impl("ElimNat", elim_impl)?;
    s.commit_block().map_err(|e| anyhow::anyhow!("{e:?}"))?;
    Ok(())
  }

  fn samples() -> Vec<Literal> {
    (0..5).map(Literal::Int).collect()
  }

  #[test]
  fn staged_entries_are_invisible_until_commit() -> anyhow::Result<()> {
    init_tracing();
    let mut s = nat_session()?;
    s.declare_type("Unit", 0)?;
    s.declare_constructor("Star", Type::base("Unit"))?;
    assert_eq!(s.pending().len(), 2);
    assert!(s.type_of(&Term::nullary("Star")).is_err());
    s.commit_block().map_err(|e| anyhow::anyhow!("{e:?}"))?;
    assert_eq!(s.type_of(&Term::nullary("Star"))?, Type::base("Unit"));
    assert!(s.pending().is_empty());
    Ok(())
  }

  #[test]
  fn duplicates_are_caught_while_staging() -> anyhow::Result<()> {
    let mut s = nat_session()?;
    assert_eq!(
      s.declare_type("Nat", 0),
      Err(KernelError::Name(NameError::Duplicate(Name::new("Nat"))))
    );
    s.declare_type("Pair", 2)?;
    assert_eq!(s.declare_type("Pair", 2).map_err(|e| e.kind()), Err(ErrorKind::Name));
    Ok(())
  }

  #[test]
  fn signature_without_owner_is_malformed() {
    let mut s = Session::new();
    let err = s.declare_constructor("Bad", Type::int()).expect_err("no owner");
    assert_eq!(err.kind(), ErrorKind::Malformed);
    let err = s.declare_eliminator("Worse", Type::bool()).expect_err("no scrutinee");
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert!(s.pending().is_empty());
  }

  #[test]
  fn abandon_discards_the_open_block() -> anyhow::Result<()> {
    let mut s = nat_session()?;
    let before = s.context().len();
    s.declare_type("Ghost", 0)?;
    s.abandon_block();
    assert!(s.pending().is_empty());
    s.commit_block().map_err(|e| anyhow::anyhow!("{e:?}"))?;
    assert_eq!(s.context().len(), before);
    s.declare_type("Ghost", 0)?;
    Ok(())
  }

  #[test]
  fn failed_commit_leaves_session_usable() -> anyhow::Result<()> {
    let mut s = nat_session()?;
    s.declare_type("Half", 0)?;
    s.declare_constructor("H", Type::base("Half"))?;
    s.declare_eliminator("Look", Type::arrow(Type::base("Half"), bool_ty()))?;
    let errors = s.commit_block().expect_err("missing equation");
    assert_eq!(errors[0].kind(), ErrorKind::NonExhaustiveEquations);
    assert!(s.pending().is_empty());
    assert!(!s.context().contains(&Name::new("Half")));
    s.declare_type("Half", 0)?;
    Ok(())
  }

  #[test]
  fn queries_use_the_committed_context() -> anyhow::Result<()> {
    let s = nat_session()?;
    let t = Term::elim("ElimNat", num(2), vec![zero(), Term::lam("k", succ(Term::var("k")))]);
    assert_eq!(s.type_of(&t)?, nat());
    assert_eq!(s.normalize(&t, 100)?, num(2));
    assert!(s.is_definitionally_equal(&t, &num(2))?);
    let pick = Term::elim("ElimBool", tt(), vec![ff(), tt()]);
    assert!(s.is_definitionally_equal(&pick, &ff())?);
    Ok(())
  }

  #[test]
  fn fuel_comes_from_the_configuration() -> anyhow::Result<()> {
    let mut s = Session::with_config(KernelConfig::default().with_fuel(3));
    declare(&mut s, bool_block())?;
    s.commit_block().map_err(|e| anyhow::anyhow!("{e:?}"))?;
    // False or (False or (... or False)), six deep
    let t = (0..6).fold(ff(), |acc, _| Term::elim("Or", ff(), vec![acc]));
    assert!(matches!(
      s.is_definitionally_equal(&t, &ff()),
      Err(KernelError::NonTerminating { fuel: 3 })
    ));
    assert!(s.normalize(&t, 10).is_ok());
    Ok(())
  }

  #[test]
  fn increment_representation_is_faithful() -> anyhow::Result<()> {
    let mut s = nat_session()?;
    nat_as_int(&mut s, succ_as_increment())?;
    let report = s.check_faithfulness("Nat", FaithfulnessMode::Symbolic, &samples())?;
    assert_eq!(report.equations.len(), 2);
    assert_eq!(report.equations[0].verdict, EquationVerdict::Proved);
    assert!(matches!(report.equations[1].verdict, EquationVerdict::HoldsOnSamples { cases: 5 }));
    assert!(!report.is_sound());
    Ok(())
  }

  #[test]
  fn identity_successor_is_rejected_with_counterexample() -> anyhow::Result<()> {
    let mut s = nat_session()?;
    nat_as_int(&mut s, Term::lam("n", Term::var("n")))?;
    match s.check_faithfulness("Nat", FaithfulnessMode::Symbolic, &samples()) {
      Err(KernelError::RepresentationMismatch { eliminator, constructor, counterexample, .. }) => {
        assert_eq!(eliminator, Name::new("ElimNat"));
        assert_eq!(constructor, Name::new("Succ"));
        assert_eq!(counterexample.bindings, vec![(Name::new("n"), Term::int(0))]);
      },
      other => panic!("expected a representation mismatch, got {other:?}"),
    }
    Ok(())
  }

  #[test]
  fn save_and_load() -> anyhow::Result<()> {
    let mut s = nat_session()?;
    nat_as_int(&mut s, succ_as_increment())?;
    s.declare_type("Unsaved", 0)?;
    let config = KernelConfig::default().with_max_sample_cases(16);
    let loaded = Session::load(&s.save(), config)?;
    assert_eq!(loaded.config(), &config);
    assert_eq!(loaded.context().len(), s.context().len());
    assert!(!loaded.context().contains(&Name::new("Unsaved")));
    let report = loaded.check_faithfulness("Nat", FaithfulnessMode::Symbolic, &samples())?;
    assert_eq!(report.equations.len(), 2);
    Ok(())
  }
}
