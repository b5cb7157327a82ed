//! Equational rewriting.
//!
//! The rewriter reduces terms in normal order: `whnf` exposes the head,
//! `normalize` then descends into the remaining subterms. Every rewrite
//! step costs one unit of fuel; running dry is `NonTerminating`.
//!
//! With an implementation table loaded, constructors and eliminators of the
//! represented type step to their concrete implementations instead of
//! reducing by their equations.

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use super::context::Context;
use super::error::{KernelError, TcResult};
use super::expr::{Literal, PrimOp, Term, TermData};
use super::name::Name;
use super::subst::{alpha_equivalent, substitute, substitute_many};

pub struct Rewriter<'ctx> {
  ctx: &'ctx Context,
  impls: FxHashMap<Name, Term>,
  limit: u64,
  remaining: u64,
}

impl<'ctx> Rewriter<'ctx> {
  pub fn new(ctx: &'ctx Context, fuel: u64) -> Self {
    Rewriter { ctx, impls: FxHashMap::default(), limit: fuel, remaining: fuel }
  }

  /// Evaluate the constructors and eliminators of `type_name` through its
  /// committed implementations.
  pub fn with_impls(mut self, type_name: &Name) -> Self {
    let ctx = self.ctx;
    let ops = ctx.constructors_of(type_name).iter().chain(ctx.eliminators_of(type_name));
    for op in ops {
      if let Some(imp) = ctx.implementation(op) {
        self.impls.insert(op.clone(), imp.expr.clone());
      }
    }
    self
  }

  pub fn reset_fuel(&mut self) {
    self.remaining = self.limit;
  }

  /// Fuel spent since construction or the last reset.
  pub fn steps(&self) -> u64 {
    self.limit - self.remaining
  }

  fn tick(&mut self, rule: &'static str, result: &Term) -> TcResult<()> {
    if self.remaining == 0 {
      warn!(fuel = self.limit, "normalization ran out of fuel");
      return Err(KernelError::NonTerminating { fuel: self.limit });
    }
    self.remaining -= 1;
    trace!(rule, term = %result, "rewrite");
    Ok(())
  }

  // ==========================================================================
  // Weak head normal form
  // ==========================================================================

  pub fn whnf(&mut self, t: &Term) -> TcResult<Term> {
    let mut cur = t.clone();
    loop {
      match self.step(&cur)? {
        Some((rule, next)) => {
          self.tick(rule, &next)?;
          cur = next;
        },
        None => return Ok(cur),
      }
    }
  }

  /// One head step, or `None` when the head is stuck. Subterms that had to
  /// be evaluated to decide are returned in their reduced form.
  fn step(&mut self, t: &Term) -> TcResult<Option<(&'static str, Term)>> {
    match t.as_data() {
      TermData::Var(_) | TermData::Lit(_) | TermData::Lam(..) | TermData::Tuple(_) => Ok(None),
      TermData::Ann(inner, _) => Ok(Some(("ann", inner.clone()))),
      TermData::App(f, a) => {
        let head = self.whnf(f)?;
        match head.as_data() {
          TermData::Lam(x, _, body) => Ok(Some(("beta", substitute(body, x, a)))),
          _ if head == *f => Ok(None),
          _ => Ok(Some(("app", Term::app(head, a.clone())))),
        }
      },
      TermData::Ctor(c, args) => match self.impls.get(c) {
        Some(imp) => Ok(Some(("impl", Term::apps(imp.clone(), args.iter().cloned())))),
        None => Ok(None),
      },
      TermData::Elim(e, scrutinee, args) => {
        if let Some(imp) = self.impls.get(e) {
          let all = std::iter::once(scrutinee.clone()).chain(args.iter().cloned());
          return Ok(Some(("impl", Term::apps(imp.clone(), all))));
        }
        let s = self.whnf(scrutinee)?;
        if let TermData::Ctor(c, fields) = s.as_data() {
          if let Some(eq) = self.ctx.equation(e, c) {
            let map: FxHashMap<Name, Term> = eq
              .bound_vars
              .iter()
              .cloned()
              .zip(fields.iter().chain(args).cloned())
              .collect();
            return Ok(Some(("equation", substitute_many(&eq.rhs, &map))));
          }
        }
        if s == *scrutinee {
          Ok(None)
        } else {
          Ok(Some(("scrutinee", Term::elim(e.clone(), s, args.clone()))))
        }
      },
      TermData::Proj(inner, idx) => {
        let s = self.whnf(inner)?;
        match s.as_data() {
          TermData::Tuple(elems) if *idx < elems.len() => Ok(Some(("proj", elems[*idx].clone()))),
          _ if s == *inner => Ok(None),
          _ => Ok(Some(("proj-arg", Term::proj(s, *idx)))),
        }
      },
      TermData::Prim(PrimOp::If, args) if args.len() == 3 => {
        let c = self.whnf(&args[0])?;
        match c.as_data() {
          TermData::Lit(Literal::Bool(true)) => Ok(Some(("if", args[1].clone()))),
          TermData::Lit(Literal::Bool(false)) => Ok(Some(("if", args[2].clone()))),
          _ if c == args[0] => Ok(None),
          _ => Ok(Some(("if-cond", Term::if_(c, args[1].clone(), args[2].clone())))),
        }
      },
      TermData::Prim(op, args) => {
        let mut reduced = Vec::with_capacity(args.len());
        for a in args {
          reduced.push(self.whnf(a)?);
        }
        if let Some(folded) = fold_prim(*op, &reduced) {
          return Ok(Some(("prim", folded)));
        }
        if reduced == *args { Ok(None) } else { Ok(Some(("prim-args", Term::prim(*op, reduced)))) }
      },
    }
  }

  // ==========================================================================
  // Full normalization
  // ==========================================================================

  pub fn normalize(&mut self, t: &Term) -> TcResult<Term> {
    let w = self.whnf(t)?;
    match w.as_data() {
      TermData::Var(_) | TermData::Lit(_) => Ok(w),
      TermData::Lam(x, ty, body) => {
        let body = self.normalize(body)?;
        Ok(match ty {
          Some(ty) => Term::lam_ann(x.clone(), ty.clone(), body),
          None => Term::lam(x.clone(), body),
        })
      },
      TermData::App(f, a) => Ok(Term::app(self.normalize(f)?, self.normalize(a)?)),
      TermData::Ann(inner, _) => self.normalize(inner),
      TermData::Ctor(c, args) => Ok(Term::ctor(c.clone(), self.normalize_all(args)?)),
      TermData::Elim(e, s, args) => {
        Ok(Term::elim(e.clone(), self.normalize(s)?, self.normalize_all(args)?))
      },
      TermData::Tuple(elems) => Ok(Term::tuple(self.normalize_all(elems)?)),
      TermData::Proj(inner, idx) => Ok(Term::proj(self.normalize(inner)?, *idx)),
      TermData::Prim(op, args) => {
        let args = self.normalize_all(args)?;
        // Normal subterms can expose folds that head reduction could not see.
        match fold_prim(*op, &args) {
          Some(folded) => {
            self.tick("prim", &folded)?;
            self.normalize(&folded)
          },
          None => Ok(Term::prim(*op, args)),
        }
      },
    }
  }

  fn normalize_all(&mut self, ts: &[Term]) -> TcResult<Vec<Term>> {
    ts.iter().map(|t| self.normalize(t)).collect()
  }
}

// ============================================================================
// Primitive folding
// ============================================================================

fn int(t: &Term) -> Option<i64> {
  match t.as_data() {
    TermData::Lit(Literal::Int(i)) => Some(*i),
    _ => None,
  }
}

fn boolean(t: &Term) -> Option<bool> {
  match t.as_data() {
    TermData::Lit(Literal::Bool(b)) => Some(*b),
    _ => None,
  }
}

/// `t + k` with `k` a literal.
fn offset(t: &Term) -> Option<(&Term, i64)> {
  match t.as_data() {
    TermData::Prim(PrimOp::Add, args) if args.len() == 2 => int(&args[1]).map(|k| (&args[0], k)),
    _ => None,
  }
}

/// Literal arithmetic with wrapping machine semantics, plus the linear
/// rewrites that keep symbolic integer terms in the shape `t + k`.
fn fold_prim(op: PrimOp, args: &[Term]) -> Option<Term> {
  match (op, args) {
    (PrimOp::Add, [a, b]) => match (int(a), int(b)) {
      (Some(x), Some(y)) => Some(Term::int(x.wrapping_add(y))),
      (Some(_), None) => Some(Term::add(b.clone(), a.clone())),
      (None, Some(0)) => Some(a.clone()),
      (None, Some(y)) => {
        offset(a).map(|(t, x)| Term::add(t.clone(), Term::int(x.wrapping_add(y))))
      },
      (None, None) => None,
    },
    (PrimOp::Sub, [a, b]) => match (int(a), int(b)) {
      (Some(x), Some(y)) => Some(Term::int(x.wrapping_sub(y))),
      (_, Some(y)) => Some(Term::add(a.clone(), Term::int(y.wrapping_neg()))),
      _ if alpha_equivalent(a, b) => Some(Term::int(0)),
      _ => None,
    },
    (PrimOp::Mul, [a, b]) => match (int(a), int(b)) {
      (Some(x), Some(y)) => Some(Term::int(x.wrapping_mul(y))),
      _ => None,
    },
    (PrimOp::Lt, [a, b]) => match (int(a), int(b)) {
      (Some(x), Some(y)) => Some(Term::boolean(x < y)),
      _ => None,
    },
    (PrimOp::Eq, [a, b]) => {
      if let (Some(x), Some(y)) = (a.as_lit(), b.as_lit()) {
        return Some(Term::boolean(x == y));
      }
      if alpha_equivalent(a, b) {
        return Some(Term::boolean(true));
      }
      if a.as_lit().is_some() {
        return Some(Term::eq(b.clone(), a.clone()));
      }
      match (offset(a), int(b)) {
        (Some((t, x)), Some(y)) => Some(Term::eq(t.clone(), Term::int(y.wrapping_sub(x)))),
        _ => None,
      }
    },
    (PrimOp::And, [a, b]) => match (boolean(a), boolean(b)) {
      (Some(false), _) | (_, Some(false)) => Some(Term::boolean(false)),
      (Some(true), _) => Some(b.clone()),
      (_, Some(true)) => Some(a.clone()),
      _ => None,
    },
    (PrimOp::Or, [a, b]) => match (boolean(a), boolean(b)) {
      (Some(true), _) | (_, Some(true)) => Some(Term::boolean(true)),
      (Some(false), _) => Some(b.clone()),
      (_, Some(false)) => Some(a.clone()),
      _ => None,
    },
    (PrimOp::Not, [a]) => boolean(a).map(|x| Term::boolean(!x)),
    _ => None,
  }
}

/// Normalize `t` with a fresh fuel budget.
pub fn normalize(ctx: &Context, t: &Term, fuel: u64) -> TcResult<Term> {
  Rewriter::new(ctx, fuel).normalize(t)
}
