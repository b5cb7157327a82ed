//! Representations and faithfulness.
//!
//! A representation backs an abstract type with a concrete layout and gives
//! every constructor and eliminator an implementation over that layout.
//! Implementations are checked against the operation's signature with the
//! abstract type replaced by the backing type. Faithfulness asks whether the
//! type's equations still hold when every operation runs through its
//! implementation.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::config::KernelConfig;
use super::context::{Context, Entry, OperationImpl, RepresentationDecl};
use super::decl::equation_binders;
use super::error::{Counterexample, KernelError, NameError, TcResult};
use super::expr::{Literal, PrimType, Term, Type, TypeData};
use super::name::Name;
use super::subst::{alpha_equivalent, free_vars, substitute_many};
use super::tc::TypeChecker;
use super::whnf::Rewriter;

// ============================================================================
// Declaration checks
// ============================================================================

pub fn check_representation(
  ctx: &Context,
  r: &RepresentationDecl,
  mark: usize,
) -> TcResult<()> {
  match ctx.position(&r.type_name) {
    Some(pos) if pos < mark => {
      ctx.type_decl(&r.type_name)?;
      Ok(())
    },
    _ => Err(KernelError::UnregisteredType { type_name: r.type_name.clone() }),
  }
}

/// The backing declared for `type_name`, in this block or an earlier one.
fn backing_of(ctx: &Context, staged: &[Entry], type_name: &Name) -> Option<Type> {
  let staged_repr = staged.iter().find_map(|e| match e {
    Entry::Representation(r) if r.type_name == *type_name => Some(r),
    _ => None,
  });
  staged_repr.or_else(|| ctx.representation(type_name)).map(|r| r.backing.to_type())
}

/// Signature of `op` lowered onto its type's backing.
pub fn lowered_signature(ctx: &Context, op: &Name, backing: &Type) -> TcResult<Type> {
  let (owner, sig) = match ctx.lookup(op)? {
    Entry::Constructor(c) => (&c.owning_type, &c.signature),
    Entry::Eliminator(e) => (&e.owning_type, &e.signature),
    other => {
      return Err(KernelError::malformed(
        op,
        format!(
          "only constructors and eliminators can be implemented, not a {}",
          other.kind_str()
        ),
      ));
    },
  };
  Ok(sig.replace_const(owner, backing))
}

pub fn check_impl(ctx: &Context, i: &OperationImpl, staged: &[Entry]) -> TcResult<()> {
  let owner = match ctx.owner_of(&i.op) {
    Some(owner) => owner,
    None => {
      ctx.lookup(&i.op)?;
      return Err(KernelError::malformed(
        &i.op,
        "only constructors and eliminators can be implemented",
      ));
    },
  };
  let Some(backing) = backing_of(ctx, staged, owner) else {
    return Err(KernelError::malformed(&i.op, format!("{owner} has no representation")));
  };
  let expected = lowered_signature(ctx, &i.op, &backing)?;
  let mut tc = TypeChecker::new(ctx);
  tc.check(&i.expr, &expected)?;
  tc.finish()
}

/// A representation must implement every operation of its type in the same
/// block.
pub fn check_complete(ctx: &Context, staged: &[Entry]) -> Vec<KernelError> {
  let mut errors = Vec::new();
  for entry in staged {
    let Entry::Representation(r) = entry else {
      continue;
    };
    let ops = ctx
      .constructors_of(&r.type_name)
      .iter()
      .chain(ctx.eliminators_of(&r.type_name));
    let missing: Vec<Name> = ops
      .filter(|op| !staged.iter().any(|e| matches!(e, Entry::Impl(i) if i.op == **op)))
      .cloned()
      .collect();
    if !missing.is_empty() {
      errors.push(KernelError::IncompleteRepresentation {
        type_name: r.type_name.clone(),
        missing,
      });
    }
  }
  errors
}

// ============================================================================
// Faithfulness
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaithfulnessMode {
  /// Prove each equation on symbolic values, falling back to samples for
  /// conditions the backing's algebra cannot decide.
  Symbolic,
  /// Only evaluate on samples. Never a proof.
  Sampling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationVerdict {
  /// Normal forms agree for all values of the bound variables.
  Proved,
  /// Normal forms agree on every sample combination tried.
  HoldsOnSamples { cases: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationReport {
  pub eliminator: Name,
  pub constructor: Name,
  pub verdict: EquationVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaithfulnessReport {
  pub type_name: Name,
  pub mode: FaithfulnessMode,
  pub equations: Vec<EquationReport>,
}

impl FaithfulnessReport {
  /// Whether every equation was proved rather than sampled.
  pub fn is_sound(&self) -> bool {
    self.mode == FaithfulnessMode::Symbolic
      && self.equations.iter().all(|e| e.verdict == EquationVerdict::Proved)
  }
}

/// One equation instantiated on symbolic bound variables.
struct Obligation {
  eliminator: Name,
  constructor: Name,
  lhs: Term,
  rhs: Term,
  /// Bound variables whose lowered type is primitive, with that type.
  sampled: Vec<(Name, PrimType)>,
}

fn obligations(ctx: &Context, type_name: &Name, backing: &Type) -> TcResult<Vec<Obligation>> {
  let mut out = Vec::new();
  for elim_name in ctx.eliminators_of(type_name) {
    let elim = ctx.eliminator(elim_name)?;
    for ctor_name in ctx.constructors_of(type_name) {
      let ctor = ctx.constructor(ctor_name)?;
      let eq = ctx.equation(elim_name, ctor_name).ok_or_else(|| {
        KernelError::NonExhaustiveEquations {
          eliminator: elim_name.clone(),
          missing: vec![ctor_name.clone()],
        }
      })?;
      let fields = ctor.fields().len();
      let vars: Vec<Term> = eq.bound_vars.iter().map(|v| Term::var(v.clone())).collect();
      let lhs = Term::elim(
        elim_name.clone(),
        Term::ctor(ctor_name.clone(), vars[..fields].to_vec()),
        vars[fields..].to_vec(),
      );
      let sampled = eq
        .bound_vars
        .iter()
        .zip(equation_binders(elim, ctor))
        .filter_map(|(v, ty)| match ty.replace_const(type_name, backing).as_data() {
          TypeData::Prim(p) => Some((v.clone(), *p)),
          _ => None,
        })
        .collect();
      out.push(Obligation {
        eliminator: elim_name.clone(),
        constructor: ctor_name.clone(),
        lhs,
        rhs: eq.rhs.clone(),
        sampled,
      });
    }
  }
  Ok(out)
}

struct Checker<'ctx> {
  rw: Rewriter<'ctx>,
  type_name: Name,
  config: KernelConfig,
}

impl Checker<'_> {
  fn normal_forms(
    &mut self,
    ob: &Obligation,
    bindings: &[(Name, Term)],
  ) -> TcResult<(Term, Term)> {
    let map: FxHashMap<Name, Term> = bindings.iter().cloned().collect();
    self.rw.reset_fuel();
    let lhs = self.rw.normalize(&substitute_many(&ob.lhs, &map))?;
    self.rw.reset_fuel();
    let rhs = self.rw.normalize(&substitute_many(&ob.rhs, &map))?;
    Ok((lhs, rhs))
  }

  fn mismatch(
    &self,
    ob: &Obligation,
    bindings: Vec<(Name, Term)>,
    lhs: Term,
    rhs: Term,
  ) -> KernelError {
    KernelError::RepresentationMismatch {
      type_name: self.type_name.clone(),
      eliminator: ob.eliminator.clone(),
      constructor: ob.constructor.clone(),
      counterexample: Box::new(Counterexample { bindings, lhs, rhs }),
    }
  }

  fn undecided(&self, ob: &Obligation) -> KernelError {
    KernelError::FaithfulnessUndecided {
      type_name: self.type_name.clone(),
      eliminator: ob.eliminator.clone(),
      constructor: ob.constructor.clone(),
    }
  }

  fn symbolic(&mut self, ob: &Obligation, samples: &[Literal]) -> TcResult<EquationVerdict> {
    let (lhs, rhs) = self.normal_forms(ob, &[])?;
    if alpha_equivalent(&lhs, &rhs) {
      return Ok(EquationVerdict::Proved);
    }
    if free_vars(&lhs).is_empty() && free_vars(&rhs).is_empty() {
      return Err(self.mismatch(ob, vec![], lhs, rhs));
    }
    if ob.sampled.is_empty() {
      return Err(self.undecided(ob));
    }
    self.sampled(ob, samples)
  }

  /// Evaluate the obligation on every combination of samples for its
  /// primitive-typed variables, up to the configured cap.
  fn sampled(&mut self, ob: &Obligation, samples: &[Literal]) -> TcResult<EquationVerdict> {
    let pools: Vec<Vec<Term>> = ob
      .sampled
      .iter()
      .map(|(_, p)| {
        samples.iter().filter(|l| l.prim_type() == *p).map(|l| Term::lit(*l)).collect()
      })
      .collect();
    if pools.iter().any(Vec::is_empty) {
      return Err(self.undecided(ob));
    }
    // With nothing to instantiate there is exactly one case: the terms as given.
    let total = pools.iter().try_fold(1usize, |acc, p| acc.checked_mul(p.len()));
    let cases = total.unwrap_or(usize::MAX).min(self.config.max_sample_cases);
    if cases == 0 {
      return Err(self.undecided(ob));
    }
    let mut digits = vec![0usize; pools.len()];
    for _ in 0..cases {
      let bindings: Vec<(Name, Term)> = ob
        .sampled
        .iter()
        .zip(&pools)
        .zip(&digits)
        .map(|(((v, _), pool), &d)| (v.clone(), pool[d].clone()))
        .collect();
      let (lhs, rhs) = self.normal_forms(ob, &bindings)?;
      if !alpha_equivalent(&lhs, &rhs) {
        return Err(self.mismatch(ob, bindings, lhs, rhs));
      }
      for (d, pool) in digits.iter_mut().zip(&pools) {
        *d += 1;
        if *d < pool.len() {
          break;
        }
        *d = 0;
      }
    }
    Ok(EquationVerdict::HoldsOnSamples { cases })
  }
}

/// Check that the committed implementations of `type_name` satisfy its
/// equations. The first violated equation is reported with a counterexample.
pub fn check_faithfulness(
  ctx: &Context,
  config: &KernelConfig,
  type_name: &Name,
  mode: FaithfulnessMode,
  samples: &[Literal],
) -> TcResult<FaithfulnessReport> {
  if !ctx.is_type(type_name) {
    return Err(NameError::Unknown(type_name.clone()).into());
  }
  let Some(repr) = ctx.representation(type_name) else {
    return Err(KernelError::malformed(type_name, "has no representation"));
  };
  let backing = repr.backing.to_type();
  let mut checker = Checker {
    rw: Rewriter::new(ctx, config.fuel).with_impls(type_name),
    type_name: type_name.clone(),
    config: *config,
  };
  let mut equations = Vec::new();
  for ob in obligations(ctx, type_name, &backing)? {
    let verdict = match mode {
      FaithfulnessMode::Symbolic => checker.symbolic(&ob, samples),
      FaithfulnessMode::Sampling => checker.sampled(&ob, samples),
    };
    let verdict = match verdict {
      Ok(v) => v,
      Err(err) => {
        debug!(
          %type_name,
          eliminator = %ob.eliminator,
          constructor = %ob.constructor,
          %err,
          "faithfulness failed"
        );
        return Err(err);
      },
    };
    debug!(
      %type_name,
      eliminator = %ob.eliminator,
      constructor = %ob.constructor,
      ?verdict,
      "equation checked"
    );
    equations.push(EquationReport {
      eliminator: ob.eliminator,
      constructor: ob.constructor,
      verdict,
    });
  }
  Ok(FaithfulnessReport { type_name: type_name.clone(), mode, equations })
}
