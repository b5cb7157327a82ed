//! Standard example types for tests.

use tracing_subscriber::EnvFilter;

use super::context::{
  Backing, ConstructorDecl, Context, EliminatorDecl, Entry, EquationDecl, OperationImpl,
  RepresentationDecl, TypeDecl,
};
use super::error::KernelError;
use super::expr::{Term, Type};
use super::name::Name;

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

// ============================================================================
// Entry builders
// ============================================================================

pub fn ty(name: &str, arity: usize) -> Entry {
  Entry::Type(TypeDecl { name: Name::new(name), arity })
}

pub fn ctor(name: &str, sig: Type) -> Entry {
  Entry::Constructor(ConstructorDecl::from_signature(name, sig).expect("constructor signature"))
}

pub fn elim(name: &str, sig: Type) -> Entry {
  Entry::Eliminator(EliminatorDecl::from_signature(name, sig).expect("eliminator signature"))
}

pub fn eqn(elim: &str, ctor: &str, vars: &[&str], rhs: Term) -> Entry {
  Entry::Equation(EquationDecl {
    eliminator: Name::new(elim),
    constructor: Name::new(ctor),
    bound_vars: vars.iter().map(Name::new).collect(),
    rhs,
  })
}

pub fn imp(op: &str, expr: Term) -> Entry {
  Entry::Impl(OperationImpl { op: Name::new(op), expr })
}

pub fn commit(ctx: &mut Context, entries: Vec<Entry>) -> Result<(), Vec<KernelError>> {
  let mut block = ctx.begin_block();
  for e in entries {
    block.stage(e).map_err(|err| vec![err.into()])?;
  }
  block.commit()
}

// ============================================================================
// Types and terms
// ============================================================================

pub fn nat() -> Type {
  Type::base("Nat")
}

pub fn bool_ty() -> Type {
  Type::base("Bool")
}

pub fn list(elem: Type) -> Type {
  Type::cnst("List", vec![elem])
}

pub fn zero() -> Term {
  Term::nullary("Zero")
}

pub fn succ(t: Term) -> Term {
  Term::ctor("Succ", vec![t])
}

pub fn num(n: u64) -> Term {
  (0..n).fold(zero(), |acc, _| succ(acc))
}

pub fn tt() -> Term {
  Term::nullary("True")
}

pub fn ff() -> Term {
  Term::nullary("False")
}

fn v(name: &str) -> Term {
  Term::var(name)
}

// ============================================================================
// Blocks
// ============================================================================

/// `Bool` with a case eliminator and disjunction.
pub fn bool_block() -> Vec<Entry> {
  let a = Type::var("a");
  vec![
    ty("Bool", 0),
    ctor("True", bool_ty()),
    ctor("False", bool_ty()),
    elim("ElimBool", Type::arrows([bool_ty(), a.clone(), a.clone()], a)),
    eqn("ElimBool", "True", &["t", "e"], v("t")),
    eqn("ElimBool", "False", &["t", "e"], v("e")),
    elim("Or", Type::arrows([bool_ty(), bool_ty()], bool_ty())),
    eqn("Or", "True", &["y"], tt()),
    eqn("Or", "False", &["y"], v("y")),
  ]
}

/// Peano naturals. Needs `Bool`.
pub fn nat_block() -> Vec<Entry> {
  let a = Type::var("a");
  vec![
    ty("Nat", 0),
    ctor("Zero", nat()),
    ctor("Succ", Type::arrow(nat(), nat())),
    elim("ElimNat", Type::arrows([nat(), a.clone(), Type::arrow(nat(), a.clone())], a)),
    eqn("ElimNat", "Zero", &["x", "f"], v("x")),
    eqn("ElimNat", "Succ", &["n", "x", "f"], Term::app(v("f"), v("n"))),
    elim("IsZero", Type::arrow(nat(), bool_ty())),
    eqn("IsZero", "Zero", &[], tt()),
    eqn("IsZero", "Succ", &["n"], ff()),
    elim("EqNat", Type::arrows([nat(), nat()], bool_ty())),
    eqn("EqNat", "Zero", &["m"], Term::elim("IsZero", v("m"), vec![])),
    eqn(
      "EqNat",
      "Succ",
      &["n", "m"],
      Term::elim(
        "ElimNat",
        v("m"),
        vec![ff(), Term::lam("p", Term::elim("EqNat", v("n"), vec![v("p")]))],
      ),
    ),
    elim("Plus", Type::arrows([nat(), nat()], nat())),
    eqn("Plus", "Zero", &["m"], v("m")),
    eqn("Plus", "Succ", &["n", "m"], succ(Term::elim("Plus", v("n"), vec![v("m")]))),
  ]
}

/// Finite sets of naturals, observable only through membership.
pub fn set_block() -> Vec<Entry> {
  let set = Type::base("Set");
  vec![
    ty("Set", 0),
    ctor("Empty", set.clone()),
    ctor("Add", Type::arrows([set.clone(), nat()], set.clone())),
    elim("Elem", Type::arrows([set, nat()], bool_ty())),
    eqn("Elem", "Empty", &["x"], ff()),
    eqn(
      "Elem",
      "Add",
      &["s", "k", "x"],
      Term::elim(
        "Or",
        Term::elim("EqNat", v("k"), vec![v("x")]),
        vec![Term::elim("Elem", v("s"), vec![v("x")])],
      ),
    ),
  ]
}

pub fn list_block() -> Vec<Entry> {
  let a = Type::var("a");
  let b = Type::var("b");
  let la = list(a.clone());
  vec![
    ty("List", 1),
    ctor("Nil", la.clone()),
    ctor("Cons", Type::arrows([a.clone(), la.clone()], la.clone())),
    elim(
      "ElimList",
      Type::arrows([la.clone(), b.clone(), Type::arrows([a, la.clone()], b.clone())], b),
    ),
    eqn("ElimList", "Nil", &["z", "c"], v("z")),
    eqn("ElimList", "Cons", &["h", "t", "z", "c"], Term::apps(v("c"), [v("h"), v("t")])),
    elim("Length", Type::arrow(la, nat())),
    eqn("Length", "Nil", &[], zero()),
    eqn("Length", "Cons", &["h", "t"], succ(Term::elim("Length", v("t"), vec![]))),
  ]
}

/// A type whose only equation reduces to itself.
pub fn loop_block() -> Vec<Entry> {
  let lp = Type::base("Loop");
  vec![
    ty("Loop", 0),
    ctor("Tick", lp.clone()),
    elim("Spin", Type::arrow(lp.clone(), lp)),
    eqn("Spin", "Tick", &[], Term::elim("Spin", Term::nullary("Tick"), vec![])),
  ]
}

/// Mutually recursive rose trees. Needs `Nat`.
pub fn tree_forest_block() -> Vec<Entry> {
  let tree = Type::base("Tree");
  let forest = Type::base("Forest");
  vec![
    ty("Tree", 0),
    ty("Forest", 0),
    ctor("Node", Type::arrow(forest.clone(), tree.clone())),
    ctor("FNil", forest.clone()),
    ctor("FCons", Type::arrows([tree.clone(), forest.clone()], forest.clone())),
    elim("Size", Type::arrow(tree, nat())),
    eqn("Size", "Node", &["f"], succ(Term::elim("Weight", v("f"), vec![]))),
    elim("Weight", Type::arrow(forest, nat())),
    eqn("Weight", "FNil", &[], zero()),
    eqn(
      "Weight",
      "FCons",
      &["t", "f"],
      Term::elim(
        "Plus",
        Term::elim("Size", v("t"), vec![]),
        vec![Term::elim("Weight", v("f"), vec![])],
      ),
    ),
  ]
}

/// Every example type, committed one block each.
pub fn std_context() -> Context {
  let mut ctx = Context::new();
  let blocks = [
    bool_block(),
    nat_block(),
    set_block(),
    list_block(),
    loop_block(),
    tree_forest_block(),
  ];
  for block in blocks {
    commit(&mut ctx, block).expect("fixture block commits");
  }
  ctx
}

// ============================================================================
// Representations
// ============================================================================

pub fn succ_as_increment() -> Term {
  Term::lam("n", Term::add(v("n"), Term::int(1)))
}

fn bool_of(cond: Term) -> Term {
  Term::if_(cond, tt(), ff())
}

/// `Nat` backed by a machine integer with `Zero = 0`.
pub fn nat_as_int(succ_impl: Term) -> Vec<Entry> {
  vec![
    Entry::Representation(RepresentationDecl { type_name: Name::new("Nat"), backing: Backing::Int }),
    imp("Zero", Term::int(0)),
    imp("Succ", succ_impl),
    imp(
      "ElimNat",
      Term::lam(
        "n",
        Term::lam(
          "x",
          Term::lam(
            "f",
            Term::if_(
              Term::eq(v("n"), Term::int(0)),
              v("x"),
              Term::app(v("f"), Term::sub(v("n"), Term::int(1))),
            ),
          ),
        ),
      ),
    ),
    imp("IsZero", Term::lam("n", bool_of(Term::eq(v("n"), Term::int(0))))),
    imp("EqNat", Term::lam("n", Term::lam("m", bool_of(Term::eq(v("n"), v("m")))))),
    imp("Plus", Term::lam("n", Term::lam("m", Term::add(v("n"), v("m"))))),
  ]
}
