//! Kernel types and terms.
//!
//! Both are immutable, reference-counted trees: cloning is cheap and every
//! transformation builds a new value. Variables are named rather than
//! de Bruijn indexed, so substitution has to avoid capture (see `subst`).

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;

use super::name::Name;

// ============================================================================
// Types
// ============================================================================

/// Primitive types of the representation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimType {
  Int,
  Bool,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type(pub Arc<TypeData>);

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
  /// A rigid type variable, universally quantified over its signature.
  Var(Name),
  /// A unification variable; only ever created by the type checker.
  Meta(u32),
  /// A declared type applied to its parameters.
  Const(Name, Vec<Type>),
  Arrow(Type, Type),
  Prim(PrimType),
  Tuple(Vec<Type>),
}

impl Type {
  pub fn as_data(&self) -> &TypeData {
    &self.0
  }

  pub fn var(name: impl Into<Name>) -> Self {
    Type(Arc::new(TypeData::Var(name.into())))
  }

  pub fn meta(id: u32) -> Self {
    Type(Arc::new(TypeData::Meta(id)))
  }

  pub fn cnst(name: impl Into<Name>, args: Vec<Type>) -> Self {
    Type(Arc::new(TypeData::Const(name.into(), args)))
  }

  /// A declared type with no parameters.
  pub fn base(name: impl Into<Name>) -> Self {
    Type::cnst(name, vec![])
  }

  pub fn arrow(dom: Type, cod: Type) -> Self {
    Type(Arc::new(TypeData::Arrow(dom, cod)))
  }

  /// `d1 -> d2 -> ... -> cod`
  pub fn arrows(doms: impl IntoIterator<Item = Type>, cod: Type) -> Self {
    let doms: Vec<Type> = doms.into_iter().collect();
    doms.into_iter().rev().fold(cod, |acc, d| Type::arrow(d, acc))
  }

  pub fn prim(p: PrimType) -> Self {
    Type(Arc::new(TypeData::Prim(p)))
  }

  pub fn int() -> Self {
    Type::prim(PrimType::Int)
  }

  pub fn bool() -> Self {
    Type::prim(PrimType::Bool)
  }

  pub fn tuple(elems: Vec<Type>) -> Self {
    Type(Arc::new(TypeData::Tuple(elems)))
  }

  /// Split `d1 -> ... -> dn -> r` (with `r` not an arrow) into `([d1..dn], r)`.
  pub fn unfold_arrows(&self) -> (Vec<Type>, Type) {
    let mut doms = Vec::new();
    let mut cursor = self.clone();
    while let TypeData::Arrow(d, c) = cursor.as_data() {
      doms.push(d.clone());
      let next = c.clone();
      cursor = next;
    }
    (doms, cursor)
  }

  /// The declared type at the head, if this is a type constant.
  pub fn head_const(&self) -> Option<(&Name, &[Type])> {
    match self.as_data() {
      TypeData::Const(name, args) => Some((name, args)),
      _ => None,
    }
  }

  /// Type variables in order of first occurrence.
  pub fn type_vars(&self) -> IndexSet<Name> {
    let mut acc = IndexSet::new();
    self.collect_vars(&mut acc);
    acc
  }

  fn collect_vars(&self, acc: &mut IndexSet<Name>) {
    match self.as_data() {
      TypeData::Var(n) => {
        acc.insert(n.clone());
      },
      TypeData::Meta(_) | TypeData::Prim(_) => {},
      TypeData::Const(_, args) | TypeData::Tuple(args) => {
        for a in args {
          a.collect_vars(acc);
        }
      },
      TypeData::Arrow(d, c) => {
        d.collect_vars(acc);
        c.collect_vars(acc);
      },
    }
  }

  pub fn has_metas(&self) -> bool {
    match self.as_data() {
      TypeData::Meta(_) => true,
      TypeData::Var(_) | TypeData::Prim(_) => false,
      TypeData::Const(_, args) | TypeData::Tuple(args) => {
        args.iter().any(Type::has_metas)
      },
      TypeData::Arrow(d, c) => d.has_metas() || c.has_metas(),
    }
  }

  /// Replace type variables according to `map`; unmapped variables stay.
  pub fn subst_vars(&self, map: &FxHashMap<Name, Type>) -> Type {
    if map.is_empty() {
      return self.clone();
    }
    self.map_leaves(&|t| match t.as_data() {
      TypeData::Var(n) => map.get(n).cloned(),
      _ => None,
    })
  }

  /// Replace every occurrence of the declared type `name` (whatever its
  /// arguments) by `with`. Used to lower signatures onto a backing type.
  pub fn replace_const(&self, name: &Name, with: &Type) -> Type {
    self.map_leaves(&|t| match t.as_data() {
      TypeData::Const(n, _) if n == name => Some(with.clone()),
      _ => None,
    })
  }

  pub fn mentions_const(&self, name: &Name) -> bool {
    match self.as_data() {
      TypeData::Const(n, args) => {
        n == name || args.iter().any(|a| a.mentions_const(name))
      },
      TypeData::Tuple(args) => args.iter().any(|a| a.mentions_const(name)),
      TypeData::Arrow(d, c) => d.mentions_const(name) || c.mentions_const(name),
      TypeData::Var(_) | TypeData::Meta(_) | TypeData::Prim(_) => false,
    }
  }

  /// Rebuild the type bottom-up, replacing any node for which `f` answers.
  pub fn map_leaves(&self, f: &dyn Fn(&Type) -> Option<Type>) -> Type {
    if let Some(t) = f(self) {
      return t;
    }
    match self.as_data() {
      TypeData::Var(_) | TypeData::Meta(_) | TypeData::Prim(_) => self.clone(),
      TypeData::Const(n, args) => {
        Type::cnst(n.clone(), args.iter().map(|a| a.map_leaves(f)).collect())
      },
      TypeData::Tuple(args) => {
        Type::tuple(args.iter().map(|a| a.map_leaves(f)).collect())
      },
      TypeData::Arrow(d, c) => Type::arrow(d.map_leaves(f), c.map_leaves(f)),
    }
  }

  fn is_atomic(&self) -> bool {
    match self.as_data() {
      TypeData::Const(_, args) => args.is_empty(),
      TypeData::Arrow(..) => false,
      _ => true,
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.as_data() {
      TypeData::Var(n) => write!(f, "{n}"),
      TypeData::Meta(id) => write!(f, "?{id}"),
      TypeData::Prim(PrimType::Int) => write!(f, "#Int"),
      TypeData::Prim(PrimType::Bool) => write!(f, "#Bool"),
      TypeData::Const(n, args) => {
        write!(f, "{n}")?;
        for a in args {
          if a.is_atomic() { write!(f, " {a}")? } else { write!(f, " ({a})")? }
        }
        Ok(())
      },
      TypeData::Arrow(d, c) => {
        if let TypeData::Arrow(..) = d.as_data() {
          write!(f, "({d}) -> {c}")
        } else {
          write!(f, "{d} -> {c}")
        }
      },
      TypeData::Tuple(elems) => {
        write!(f, "(")?;
        for (i, e) in elems.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{e}")?;
        }
        write!(f, ")")
      },
    }
  }
}

impl fmt::Debug for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

// ============================================================================
// Literals and primitive operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
  Int(i64),
  Bool(bool),
}

impl Literal {
  pub fn prim_type(&self) -> PrimType {
    match self {
      Literal::Int(_) => PrimType::Int,
      Literal::Bool(_) => PrimType::Bool,
    }
  }
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Literal::Int(i) => write!(f, "{i}"),
      Literal::Bool(b) => write!(f, "{b}"),
    }
  }
}

/// Built-in operations over the primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
  Add,
  Sub,
  Mul,
  Eq,
  Lt,
  And,
  Or,
  Not,
  /// `if c t e`, lazy in both branches.
  If,
}

impl PrimOp {
  pub const ALL: [PrimOp; 9] = [
    PrimOp::Add,
    PrimOp::Sub,
    PrimOp::Mul,
    PrimOp::Eq,
    PrimOp::Lt,
    PrimOp::And,
    PrimOp::Or,
    PrimOp::Not,
    PrimOp::If,
  ];

  pub fn arity(self) -> usize {
    match self {
      PrimOp::Not => 1,
      PrimOp::If => 3,
      _ => 2,
    }
  }

  pub fn symbol(self) -> &'static str {
    match self {
      PrimOp::Add => "+",
      PrimOp::Sub => "-",
      PrimOp::Mul => "*",
      PrimOp::Eq => "==",
      PrimOp::Lt => "<",
      PrimOp::And => "and",
      PrimOp::Or => "or",
      PrimOp::Not => "not",
      PrimOp::If => "if",
    }
  }
}

// ============================================================================
// Terms
// ============================================================================

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Term(pub Arc<TermData>);

#[derive(Debug, PartialEq, Eq, Hash)]
pub enum TermData {
  Var(Name),
  App(Term, Term),
  /// Function literal with an optional binder annotation.
  Lam(Name, Option<Type>, Term),
  /// Type ascription; switches the checker into checking mode.
  Ann(Term, Type),
  /// Saturated constructor application.
  Ctor(Name, Vec<Term>),
  /// Eliminator applied to its scrutinee and remaining arguments.
  Elim(Name, Term, Vec<Term>),
  Lit(Literal),
  Prim(PrimOp, Vec<Term>),
  Tuple(Vec<Term>),
  Proj(Term, usize),
}

impl Term {
  pub fn as_data(&self) -> &TermData {
    &self.0
  }

  pub fn var(name: impl Into<Name>) -> Self {
    Term(Arc::new(TermData::Var(name.into())))
  }

  pub fn app(fun: Term, arg: Term) -> Self {
    Term(Arc::new(TermData::App(fun, arg)))
  }

  /// Left-nested application `f a1 a2 ... an`.
  pub fn apps(fun: Term, args: impl IntoIterator<Item = Term>) -> Self {
    args.into_iter().fold(fun, Term::app)
  }

  pub fn lam(name: impl Into<Name>, body: Term) -> Self {
    Term(Arc::new(TermData::Lam(name.into(), None, body)))
  }

  pub fn lam_ann(name: impl Into<Name>, ty: Type, body: Term) -> Self {
    Term(Arc::new(TermData::Lam(name.into(), Some(ty), body)))
  }

  pub fn ann(term: Term, ty: Type) -> Self {
    Term(Arc::new(TermData::Ann(term, ty)))
  }

  pub fn ctor(name: impl Into<Name>, args: Vec<Term>) -> Self {
    Term(Arc::new(TermData::Ctor(name.into(), args)))
  }

  /// A constructor with no fields.
  pub fn nullary(name: impl Into<Name>) -> Self {
    Term::ctor(name, vec![])
  }

  pub fn elim(name: impl Into<Name>, scrutinee: Term, args: Vec<Term>) -> Self {
    Term(Arc::new(TermData::Elim(name.into(), scrutinee, args)))
  }

  pub fn lit(lit: Literal) -> Self {
    Term(Arc::new(TermData::Lit(lit)))
  }

  pub fn int(i: i64) -> Self {
    Term::lit(Literal::Int(i))
  }

  pub fn boolean(b: bool) -> Self {
    Term::lit(Literal::Bool(b))
  }

  pub fn prim(op: PrimOp, args: Vec<Term>) -> Self {
    Term(Arc::new(TermData::Prim(op, args)))
  }

  pub fn add(a: Term, b: Term) -> Self {
    Term::prim(PrimOp::Add, vec![a, b])
  }

  pub fn sub(a: Term, b: Term) -> Self {
    Term::prim(PrimOp::Sub, vec![a, b])
  }

  pub fn eq(a: Term, b: Term) -> Self {
    Term::prim(PrimOp::Eq, vec![a, b])
  }

  pub fn if_(c: Term, t: Term, e: Term) -> Self {
    Term::prim(PrimOp::If, vec![c, t, e])
  }

  pub fn tuple(elems: Vec<Term>) -> Self {
    Term(Arc::new(TermData::Tuple(elems)))
  }

  pub fn proj(term: Term, idx: usize) -> Self {
    Term(Arc::new(TermData::Proj(term, idx)))
  }

  /// Split `f a1 ... an` into `(f, [a1, ..., an])`.
  pub fn unfold_apps(&self) -> (Term, Vec<Term>) {
    let mut args = Vec::new();
    let mut cursor = self.clone();
    while let TermData::App(f, a) = cursor.as_data() {
      args.push(a.clone());
      let next = f.clone();
      cursor = next;
    }
    args.reverse();
    (cursor, args)
  }

  pub fn as_lit(&self) -> Option<Literal> {
    match self.as_data() {
      TermData::Lit(l) => Some(*l),
      _ => None,
    }
  }

  fn is_atomic(&self) -> bool {
    match self.as_data() {
      TermData::Var(_)
      | TermData::Lit(_)
      | TermData::Tuple(_)
      | TermData::Proj(..)
      | TermData::Ann(..) => true,
      TermData::Ctor(_, args) => args.is_empty(),
      TermData::Prim(op, _) => !matches!(op, PrimOp::Not | PrimOp::If),
      _ => false,
    }
  }
}

struct Arg<'a>(&'a Term);

impl fmt::Display for Arg<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.0.is_atomic() { write!(f, "{}", self.0) } else { write!(f, "({})", self.0) }
  }
}

impl fmt::Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.as_data() {
      TermData::Var(n) => write!(f, "{n}"),
      TermData::Lit(l) => write!(f, "{l}"),
      TermData::App(..) => {
        let (head, args) = self.unfold_apps();
        write!(f, "{}", Arg(&head))?;
        for a in &args {
          write!(f, " {}", Arg(a))?;
        }
        Ok(())
      },
      TermData::Lam(x, None, body) => write!(f, "\\{x}. {body}"),
      TermData::Lam(x, Some(ty), body) => write!(f, "\\({x} : {ty}). {body}"),
      TermData::Ann(t, ty) => write!(f, "({t} : {ty})"),
      TermData::Ctor(c, args) => {
        write!(f, "{c}")?;
        for a in args {
          write!(f, " {}", Arg(a))?;
        }
        Ok(())
      },
      TermData::Elim(e, s, args) => {
        write!(f, "{e} {}", Arg(s))?;
        for a in args {
          write!(f, " {}", Arg(a))?;
        }
        Ok(())
      },
      TermData::Prim(PrimOp::If, args) if args.len() == 3 => write!(
        f,
        "if {} then {} else {}",
        args[0], args[1], args[2]
      ),
      TermData::Prim(op, args) if args.len() == 2 && op.arity() == 2 => {
        write!(f, "({} {} {})", Arg(&args[0]), op.symbol(), Arg(&args[1]))
      },
      TermData::Prim(op, args) => {
        write!(f, "{}", op.symbol())?;
        for a in args {
          write!(f, " {}", Arg(a))?;
        }
        Ok(())
      },
      TermData::Tuple(elems) => {
        write!(f, "(")?;
        for (i, e) in elems.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{e}")?;
        }
        write!(f, ")")
      },
      TermData::Proj(t, i) => write!(f, "{}.{i}", Arg(t)),
    }
  }
}

impl fmt::Debug for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}
