//! Free variables, capture-avoiding substitution and alpha-equivalence.

use std::sync::Arc;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;

use super::expr::{Term, TermData};
use super::name::Name;

// ============================================================================
// Free variables
// ============================================================================

/// Free variables of `t`, in order of first occurrence.
pub fn free_vars(t: &Term) -> IndexSet<Name> {
  let mut acc = IndexSet::new();
  let mut bound = Vec::new();
  free_vars_aux(t, &mut bound, &mut acc);
  acc
}

fn free_vars_aux(t: &Term, bound: &mut Vec<Name>, acc: &mut IndexSet<Name>) {
  match t.as_data() {
    TermData::Var(x) => {
      if !bound.contains(x) {
        acc.insert(x.clone());
      }
    },
    TermData::Lam(x, _, body) => {
      bound.push(x.clone());
      free_vars_aux(body, bound, acc);
      bound.pop();
    },
    TermData::App(f, a) => {
      free_vars_aux(f, bound, acc);
      free_vars_aux(a, bound, acc);
    },
    TermData::Ann(t, _) | TermData::Proj(t, _) => free_vars_aux(t, bound, acc),
    TermData::Elim(_, s, args) => {
      free_vars_aux(s, bound, acc);
      for a in args {
        free_vars_aux(a, bound, acc);
      }
    },
    TermData::Ctor(_, args) | TermData::Prim(_, args) | TermData::Tuple(args) => {
      for a in args {
        free_vars_aux(a, bound, acc);
      }
    },
    TermData::Lit(_) => {},
  }
}

pub fn occurs_free(x: &Name, t: &Term) -> bool {
  free_vars(t).contains(x)
}

// ============================================================================
// Substitution
// ============================================================================

/// `t[x := r]`, renaming binders of `t` that would capture free variables
/// of `r`.
pub fn substitute(t: &Term, x: &Name, r: &Term) -> Term {
  let mut map = FxHashMap::default();
  map.insert(x.clone(), r.clone());
  substitute_many(t, &map)
}

/// Simultaneous capture-avoiding substitution: every free occurrence of a
/// key of `map` is replaced at once, so replacements are never themselves
/// rewritten.
pub fn substitute_many(t: &Term, map: &FxHashMap<Name, Term>) -> Term {
  if map.is_empty() {
    return t.clone();
  }
  let avoid: IndexSet<Name> = map.values().flat_map(free_vars).collect();
  subst_aux(t, map, &avoid)
}

fn subst_aux(t: &Term, map: &FxHashMap<Name, Term>, avoid: &IndexSet<Name>) -> Term {
  match t.as_data() {
    TermData::Var(x) => map.get(x).cloned().unwrap_or_else(|| t.clone()),
    TermData::Lit(_) => t.clone(),
    TermData::Lam(x, ty, body) => {
      let mut inner = map.clone();
      inner.remove(x);
      let body_fv = free_vars(body);
      if !inner.keys().any(|k| body_fv.contains(k)) {
        return t.clone();
      }
      if avoid.contains(x) {
        let fresh =
          x.freshen(|n| avoid.contains(n) || body_fv.contains(n) || inner.contains_key(n));
        let renamed = substitute(body, x, &Term::var(fresh.clone()));
        let new_body = subst_aux(&renamed, &inner, avoid);
        return Term(Arc::new(TermData::Lam(fresh, ty.clone(), new_body)));
      }
      let new_body = subst_aux(body, &inner, avoid);
      Term(Arc::new(TermData::Lam(x.clone(), ty.clone(), new_body)))
    },
    TermData::App(f, a) => Term::app(subst_aux(f, map, avoid), subst_aux(a, map, avoid)),
    TermData::Ann(inner, ty) => Term::ann(subst_aux(inner, map, avoid), ty.clone()),
    TermData::Proj(inner, i) => Term::proj(subst_aux(inner, map, avoid), *i),
    TermData::Ctor(c, args) => Term::ctor(c.clone(), subst_all(args, map, avoid)),
    TermData::Elim(e, s, args) => {
      Term::elim(e.clone(), subst_aux(s, map, avoid), subst_all(args, map, avoid))
    },
    TermData::Prim(op, args) => Term::prim(*op, subst_all(args, map, avoid)),
    TermData::Tuple(args) => Term::tuple(subst_all(args, map, avoid)),
  }
}

fn subst_all(
  args: &[Term],
  map: &FxHashMap<Name, Term>,
  avoid: &IndexSet<Name>,
) -> Vec<Term> {
  args.iter().map(|a| subst_aux(a, map, avoid)).collect()
}

// ============================================================================
// Alpha-equivalence
// ============================================================================

/// Equality up to renaming of bound variables. Binder annotations are
/// checker hints and do not take part in the comparison.
pub fn alpha_equivalent(a: &Term, b: &Term) -> bool {
  alpha_aux(a, b, &mut Vec::new(), &mut Vec::new())
}

fn alpha_aux(a: &Term, b: &Term, env_a: &mut Vec<Name>, env_b: &mut Vec<Name>) -> bool {
  if env_a.is_empty() && env_b.is_empty() && a == b {
    return true;
  }
  match (a.as_data(), b.as_data()) {
    (TermData::Var(x), TermData::Var(y)) => {
      let ia = env_a.iter().rposition(|n| n == x);
      let ib = env_b.iter().rposition(|n| n == y);
      match (ia, ib) {
        (Some(i), Some(j)) => i == j,
        (None, None) => x == y,
        _ => false,
      }
    },
    (TermData::Lam(x, _, bx), TermData::Lam(y, _, by)) => {
      env_a.push(x.clone());
      env_b.push(y.clone());
      let res = alpha_aux(bx, by, env_a, env_b);
      env_a.pop();
      env_b.pop();
      res
    },
    (TermData::App(f1, a1), TermData::App(f2, a2)) => {
      alpha_aux(f1, f2, env_a, env_b) && alpha_aux(a1, a2, env_a, env_b)
    },
    (TermData::Ann(t1, ty1), TermData::Ann(t2, ty2)) => {
      ty1 == ty2 && alpha_aux(t1, t2, env_a, env_b)
    },
    (TermData::Proj(t1, i1), TermData::Proj(t2, i2)) => {
      i1 == i2 && alpha_aux(t1, t2, env_a, env_b)
    },
    (TermData::Lit(l1), TermData::Lit(l2)) => l1 == l2,
    (TermData::Ctor(c1, xs), TermData::Ctor(c2, ys)) => {
      c1 == c2 && alpha_all(xs, ys, env_a, env_b)
    },
    (TermData::Elim(e1, s1, xs), TermData::Elim(e2, s2, ys)) => {
      e1 == e2 && alpha_aux(s1, s2, env_a, env_b) && alpha_all(xs, ys, env_a, env_b)
    },
    (TermData::Prim(o1, xs), TermData::Prim(o2, ys)) => {
      o1 == o2 && alpha_all(xs, ys, env_a, env_b)
    },
    (TermData::Tuple(xs), TermData::Tuple(ys)) => alpha_all(xs, ys, env_a, env_b),
    _ => false,
  }
}

fn alpha_all(xs: &[Term], ys: &[Term], env_a: &mut Vec<Name>, env_b: &mut Vec<Name>) -> bool {
  xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| alpha_aux(x, y, env_a, env_b))
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use quickcheck::{Arbitrary, Gen};

  const VARS: [&str; 4] = ["x", "y", "z", "w"];

  fn arbitrary_name(g: &mut Gen) -> Name {
    Name::new(*g.choose(&VARS).unwrap_or(&"x"))
  }

  pub fn arbitrary_term(g: &mut Gen, depth: usize) -> Term {
    let cases = if depth == 0 { 2 } else { 7 };
    match usize::arbitrary(g) % cases {
      0 => Term::var(arbitrary_name(g)),
      1 => Term::nullary("Z"),
      2 | 3 => Term::lam(arbitrary_name(g), arbitrary_term(g, depth - 1)),
      4 => Term::app(arbitrary_term(g, depth - 1), arbitrary_term(g, depth - 1)),
      5 => Term::ctor("S", vec![arbitrary_term(g, depth - 1)]),
      _ => Term::elim(
        "E",
        arbitrary_term(g, depth - 1),
        vec![arbitrary_term(g, depth - 1)],
      ),
    }
  }

  impl Arbitrary for Term {
    fn arbitrary(g: &mut Gen) -> Self {
      arbitrary_term(g, 4)
    }
  }

  impl Arbitrary for Name {
    fn arbitrary(g: &mut Gen) -> Self {
      arbitrary_name(g)
    }
  }

  #[test]
  fn substitution_renames_capturing_binder() {
    // (\y. x y)[x := y]  ==>  \y'1. y y'1
    let t = Term::lam("y", Term::app(Term::var("x"), Term::var("y")));
    let res = substitute(&t, &Name::new("x"), &Term::var("y"));
    let expected = Term::lam("y'1", Term::app(Term::var("y"), Term::var("y'1")));
    assert_eq!(res, expected);
  }

  #[test]
  fn substitution_respects_shadowing() {
    let t = Term::lam("x", Term::var("x"));
    assert_eq!(substitute(&t, &Name::new("x"), &Term::int(3)), t);
  }

  #[test]
  fn simultaneous_substitution_does_not_chain() {
    let t = Term::app(Term::var("x"), Term::var("y"));
    let mut map = FxHashMap::default();
    map.insert(Name::new("x"), Term::var("y"));
    map.insert(Name::new("y"), Term::var("x"));
    assert_eq!(substitute_many(&t, &map), Term::app(Term::var("y"), Term::var("x")));
  }

  #[test]
  fn alpha_equivalence_ignores_binder_names() {
    let a = Term::lam("x", Term::lam("y", Term::var("x")));
    let b = Term::lam("p", Term::lam("q", Term::var("p")));
    let c = Term::lam("p", Term::lam("q", Term::var("q")));
    assert!(alpha_equivalent(&a, &b));
    assert!(!alpha_equivalent(&a, &c));
    assert!(!alpha_equivalent(&Term::lam("x", Term::var("z")), &Term::lam("x", Term::var("x"))));
  }

  #[test]
  fn free_vars_skip_bound() {
    let t = Term::lam("x", Term::apps(Term::var("f"), [Term::var("x"), Term::var("y")]));
    let fv: Vec<_> = free_vars(&t).into_iter().collect();
    assert_eq!(fv, vec![Name::new("f"), Name::new("y")]);
  }

  #[quickcheck]
  fn prop_alpha_reflexive(t: Term) -> bool {
    alpha_equivalent(&t, &t)
  }

  #[quickcheck]
  fn prop_identity_substitution(t: Term, x: Name) -> bool {
    alpha_equivalent(&substitute(&t, &x, &Term::var(x.clone())), &t)
  }

  #[quickcheck]
  fn prop_substitution_free_vars(t: Term, x: Name, r: Term) -> bool {
    let res = free_vars(&substitute(&t, &x, &r));
    let fv_t = free_vars(&t);
    let fv_r = free_vars(&r);
    let within = res.iter().all(|n| (fv_t.contains(n) && *n != x) || fv_r.contains(n));
    let preserved = !fv_t.contains(&x) || fv_r.iter().all(|n| res.contains(n));
    within && preserved
  }

  #[quickcheck]
  fn prop_bound_renaming_is_alpha(t: Term, x: Name) -> bool {
    let fv = free_vars(&t);
    let fresh = x.freshen(|n| fv.contains(n));
    let renamed = Term::lam(fresh.clone(), substitute(&t, &x, &Term::var(fresh)));
    alpha_equivalent(&Term::lam(x, t), &renamed)
  }
}
