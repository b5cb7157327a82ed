//! Bidirectional type checking.
//!
//! Signatures are polymorphic in their type variables; every use of a
//! constructor or eliminator instantiates them with fresh metavariables that
//! are solved by first-order unification. Type variables that occur in the
//! local context (equation binders, implementation signatures) are rigid.

use rustc_hash::FxHashMap;

use super::context::{Context, Entry};
use super::error::{KernelError, TcResult, TypeError};
use super::expr::{PrimOp, PrimType, Term, TermData, Type, TypeData};
use super::guard;
use super::name::Name;

/// The kernel type checker.
pub struct TypeChecker<'ctx> {
  pub ctx: &'ctx Context,
  metas: Vec<Option<Type>>,
  locals: Vec<(Name, Type)>,
  /// `==` operands whose type was still unknown when they were compared.
  equalities: Vec<(Term, Type)>,
}

impl<'ctx> TypeChecker<'ctx> {
  pub fn new(ctx: &'ctx Context) -> Self {
    TypeChecker { ctx, metas: Vec::new(), locals: Vec::new(), equalities: Vec::new() }
  }

  // ==========================================================================
  // Metavariables and unification
  // ==========================================================================

  pub fn fresh_meta(&mut self) -> Type {
    let id = self.metas.len() as u32;
    self.metas.push(None);
    Type::meta(id)
  }

  /// Follow solved metavariables at the head.
  fn resolve(&self, ty: &Type) -> Type {
    let mut cursor = ty.clone();
    while let TypeData::Meta(id) = cursor.as_data() {
      match self.metas.get(*id as usize) {
        Some(Some(sol)) => {
          let next = sol.clone();
          cursor = next;
        },
        _ => break,
      }
    }
    cursor
  }

  /// Substitute every solved metavariable, deeply.
  pub fn zonk(&self, ty: &Type) -> Type {
    let ty = self.resolve(ty);
    match ty.as_data() {
      TypeData::Var(_) | TypeData::Meta(_) | TypeData::Prim(_) => ty.clone(),
      TypeData::Const(n, args) => {
        Type::cnst(n.clone(), args.iter().map(|a| self.zonk(a)).collect())
      },
      TypeData::Tuple(args) => Type::tuple(args.iter().map(|a| self.zonk(a)).collect()),
      TypeData::Arrow(d, c) => Type::arrow(self.zonk(d), self.zonk(c)),
    }
  }

  fn occurs(&self, id: u32, ty: &Type) -> bool {
    let ty = self.resolve(ty);
    match ty.as_data() {
      TypeData::Meta(m) => *m == id,
      TypeData::Var(_) | TypeData::Prim(_) => false,
      TypeData::Const(_, args) | TypeData::Tuple(args) => {
        args.iter().any(|a| self.occurs(id, a))
      },
      TypeData::Arrow(d, c) => self.occurs(id, d) || self.occurs(id, c),
    }
  }

  pub fn unify(&mut self, a: &Type, b: &Type) -> bool {
    let a = self.resolve(a);
    let b = self.resolve(b);
    match (a.as_data(), b.as_data()) {
      (TypeData::Meta(i), TypeData::Meta(j)) if i == j => true,
      (TypeData::Meta(i), _) => self.bind(*i, &b),
      (_, TypeData::Meta(j)) => self.bind(*j, &a),
      (TypeData::Var(x), TypeData::Var(y)) => x == y,
      (TypeData::Prim(p), TypeData::Prim(q)) => p == q,
      (TypeData::Const(n, xs), TypeData::Const(m, ys)) => {
        n == m && xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.unify(x, y))
      },
      (TypeData::Tuple(xs), TypeData::Tuple(ys)) => {
        xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.unify(x, y))
      },
      (TypeData::Arrow(d1, c1), TypeData::Arrow(d2, c2)) => {
        self.unify(d1, d2) && self.unify(c1, c2)
      },
      _ => false,
    }
  }

  fn bind(&mut self, id: u32, ty: &Type) -> bool {
    if self.occurs(id, ty) {
      return false;
    }
    match self.metas.get_mut(id as usize) {
      Some(slot) => {
        *slot = Some(ty.clone());
        true
      },
      None => false,
    }
  }

  /// Replace the type variables of a signature with fresh metavariables.
  pub fn instantiate(&mut self, sig: &Type) -> Type {
    let mut map = FxHashMap::default();
    for v in sig.type_vars() {
      let m = self.fresh_meta();
      map.insert(v, m);
    }
    sig.subst_vars(&map)
  }

  // ==========================================================================
  // Local context
  // ==========================================================================

  pub fn push_local(&mut self, name: Name, ty: Type) {
    self.locals.push((name, ty));
  }

  pub fn pop_local(&mut self) {
    self.locals.pop();
  }

  fn lookup_local(&self, name: &Name) -> Option<&Type> {
    self.locals.iter().rev().find(|(n, _)| n == name).map(|(_, t)| t)
  }

  // ==========================================================================
  // Well-formed types
  // ==========================================================================

  pub fn check_type(&self, ty: &Type) -> TcResult<()> {
    match ty.as_data() {
      TypeData::Var(_) | TypeData::Prim(_) => Ok(()),
      TypeData::Meta(_) => Err(TypeError::MetaInAnnotation { ty: ty.clone() }.into()),
      TypeData::Arrow(d, c) => {
        self.check_type(d)?;
        self.check_type(c)
      },
      TypeData::Tuple(elems) => elems.iter().try_for_each(|e| self.check_type(e)),
      TypeData::Const(name, args) => {
        match self.ctx.lookup(name)? {
          Entry::Type(decl) => {
            if decl.arity != args.len() {
              return Err(
                TypeError::TypeArityMismatch {
                  name: name.clone(),
                  expected: decl.arity,
                  found: args.len(),
                }
                .into(),
              );
            }
          },
          _ => return Err(TypeError::NotAType { name: name.clone() }.into()),
        }
        args.iter().try_for_each(|a| self.check_type(a))
      },
    }
  }

  // ==========================================================================
  // Inference
  // ==========================================================================

  fn mismatch(&self, term: &Term, expected: &Type, found: &Type) -> KernelError {
    TypeError::TypeMismatch {
      term: term.clone(),
      expected: self.zonk(expected),
      found: self.zonk(found),
    }
    .into()
  }

  pub fn infer(&mut self, t: &Term) -> TcResult<Type> {
    let ctx = self.ctx;
    match t.as_data() {
      TermData::Var(x) => match self.lookup_local(x) {
        Some(ty) => Ok(ty.clone()),
        None => Err(TypeError::UnboundVariable(x.clone()).into()),
      },
      TermData::Lit(lit) => Ok(Type::prim(lit.prim_type())),
      TermData::Lam(x, ann, body) => {
        let dom = match ann {
          Some(ty) => {
            self.check_type(ty)?;
            ty.clone()
          },
          None => self.fresh_meta(),
        };
        self.push_local(x.clone(), dom.clone());
        let body_ty = self.infer(body);
        self.pop_local();
        Ok(Type::arrow(dom, body_ty?))
      },
      TermData::App(f, a) => {
        let f_ty = self.infer(f)?;
        let resolved = self.resolve(&f_ty);
        let (dom, cod) = match resolved.as_data() {
          TypeData::Arrow(d, c) => (d.clone(), c.clone()),
          TypeData::Meta(_) => {
            let d = self.fresh_meta();
            let c = self.fresh_meta();
            self.unify(&resolved, &Type::arrow(d.clone(), c.clone()));
            (d, c)
          },
          _ => {
            return Err(
              TypeError::NotAFunction { term: f.clone(), found: self.zonk(&f_ty) }.into(),
            );
          },
        };
        self.check_arg(f, a, &dom)?;
        Ok(cod)
      },
      TermData::Ann(inner, ty) => {
        self.check_type(ty)?;
        self.check(inner, ty)?;
        Ok(ty.clone())
      },
      TermData::Ctor(c, args) => {
        let decl = ctx.constructor(c)?;
        let sig = self.instantiate(&decl.signature);
        let (doms, cod) = sig.unfold_arrows();
        if doms.len() != args.len() {
          return Err(
            TypeError::ConstructorArityMismatch {
              constructor: c.clone(),
              expected: doms.len(),
              found: args.len(),
            }
            .into(),
          );
        }
        for (arg, dom) in args.iter().zip(&doms) {
          self.check(arg, dom)?;
        }
        Ok(cod)
      },
      TermData::Elim(e, scrutinee, args) => self.infer_elim(e, scrutinee, args),
      TermData::Prim(op, args) => self.infer_prim(*op, args),
      TermData::Tuple(elems) => {
        let mut tys = Vec::with_capacity(elems.len());
        for e in elems {
          tys.push(self.infer(e)?);
        }
        Ok(Type::tuple(tys))
      },
      TermData::Proj(inner, idx) => {
        let ty = self.infer(inner)?;
        let ty = self.zonk(&ty);
        guard::check_projection(ctx, *idx, &ty)?;
        match ty.as_data() {
          TypeData::Tuple(elems) if *idx < elems.len() => Ok(elems[*idx].clone()),
          _ => Err(TypeError::ProjectionOutOfRange { index: *idx, found: ty.clone() }.into()),
        }
      },
    }
  }

  /// Check an argument against a function's domain, reporting a mismatch at
  /// the argument itself as an application mismatch.
  fn check_arg(&mut self, f: &Term, a: &Term, dom: &Type) -> TcResult<()> {
    match self.check(a, dom) {
      Err(KernelError::Type(TypeError::TypeMismatch { term, expected, found })) if term == *a => {
        Err(
          TypeError::ApplicationMismatch { function: f.clone(), arg: term, expected, found }
            .into(),
        )
      },
      other => other,
    }
  }

  fn infer_elim(&mut self, e: &Name, scrutinee: &Term, args: &[Term]) -> TcResult<Type> {
    let ctx = self.ctx;
    let decl = ctx.eliminator(e)?;
    let s_ty = self.infer(scrutinee)?;
    let s_ty = self.zonk(&s_ty);
    guard::check_eliminator(ctx, decl, &s_ty)?;
    let sig = self.instantiate(&decl.signature);
    let (doms, cod) = sig.unfold_arrows();
    let Some((scrut_ty, rest)) = doms.split_first() else {
      return Err(KernelError::malformed(e, "eliminator takes no scrutinee"));
    };
    if !self.unify(&s_ty, scrut_ty) {
      return Err(self.mismatch(scrutinee, scrut_ty, &s_ty));
    }
    if rest.len() != args.len() {
      return Err(
        TypeError::EliminatorArityMismatch {
          eliminator: e.clone(),
          expected: rest.len(),
          found: args.len(),
        }
        .into(),
      );
    }
    if decl.is_case() {
      let ctors = ctx.constructors_of(&decl.owning_type);
      for (i, ((branch, dom), ctor)) in args.iter().zip(rest).zip(ctors).enumerate() {
        let fields = ctx.constructor(ctor)?.fields().len();
        self.check_branch(e, i, branch, dom, fields, &cod)?;
      }
    } else {
      for (arg, dom) in args.iter().zip(rest) {
        self.check(arg, dom)?;
      }
    }
    Ok(cod)
  }

  /// A branch must take the constructor's fields and return the motive. The
  /// first branch to mention the motive fixes it for the rest.
  fn check_branch(
    &mut self,
    e: &Name,
    index: usize,
    branch: &Term,
    dom: &Type,
    fields: usize,
    motive: &Type,
  ) -> TcResult<()> {
    let mut field_tys = Vec::with_capacity(fields);
    let mut cursor = dom.clone();
    for _ in 0..fields {
      let next = match cursor.as_data() {
        TypeData::Arrow(d, c) => {
          field_tys.push(d.clone());
          c.clone()
        },
        _ => break,
      };
      cursor = next;
    }
    let found = self.infer(branch)?;
    let result = self.fresh_meta();
    if !self.unify(&found, &Type::arrows(field_tys, result.clone())) {
      return Err(self.mismatch(branch, dom, &found));
    }
    if !self.unify(&result, motive) {
      return Err(
        TypeError::MotiveMismatch {
          eliminator: e.clone(),
          branch: index,
          expected: self.zonk(motive),
          found: self.zonk(&result),
        }
        .into(),
      );
    }
    Ok(())
  }

  /// Infer an argument that a primitive operation will look at.
  fn infer_inspected(&mut self, op: PrimOp, arg: &Term) -> TcResult<Type> {
    let ty = self.infer(arg)?;
    let ty = self.zonk(&ty);
    guard::check_primitive(self.ctx, op, &ty)?;
    Ok(ty)
  }

  fn check_prim_arg(&mut self, op: PrimOp, arg: &Term, expected: PrimType) -> TcResult<()> {
    let ty = self.infer_inspected(op, arg)?;
    let expected = Type::prim(expected);
    if self.unify(&ty, &expected) { Ok(()) } else { Err(self.mismatch(arg, &expected, &ty)) }
  }

  fn infer_prim(&mut self, op: PrimOp, args: &[Term]) -> TcResult<Type> {
    if args.len() != op.arity() {
      return Err(
        TypeError::PrimArityMismatch {
          op: op.symbol(),
          expected: op.arity(),
          found: args.len(),
        }
        .into(),
      );
    }
    match op {
      PrimOp::Add | PrimOp::Sub | PrimOp::Mul => {
        for a in args {
          self.check_prim_arg(op, a, PrimType::Int)?;
        }
        Ok(Type::int())
      },
      PrimOp::Lt => {
        for a in args {
          self.check_prim_arg(op, a, PrimType::Int)?;
        }
        Ok(Type::bool())
      },
      PrimOp::And | PrimOp::Or | PrimOp::Not => {
        for a in args {
          self.check_prim_arg(op, a, PrimType::Bool)?;
        }
        Ok(Type::bool())
      },
      PrimOp::Eq => {
        let lhs = self.infer_inspected(op, &args[0])?;
        let rhs = self.infer_inspected(op, &args[1])?;
        if !self.unify(&lhs, &rhs) {
          return Err(self.mismatch(&args[1], &lhs, &rhs));
        }
        let ty = self.zonk(&lhs);
        match ty.as_data() {
          TypeData::Prim(_) => Ok(Type::bool()),
          TypeData::Meta(_) => {
            self.equalities.push((args[0].clone(), ty));
            Ok(Type::bool())
          },
          _ => Err(self.mismatch(&args[0], &Type::int(), &ty)),
        }
      },
      PrimOp::If => {
        self.check_prim_arg(op, &args[0], PrimType::Bool)?;
        let ty = self.infer(&args[1])?;
        self.check(&args[2], &ty)?;
        Ok(ty)
      },
    }
  }

  // ==========================================================================
  // Checking
  // ==========================================================================

  /// Revisit the `==` comparisons made before their operand types were
  /// known. Call once the whole term has been checked.
  pub fn finish(&mut self) -> TcResult<()> {
    for (term, ty) in std::mem::take(&mut self.equalities) {
      let ty = self.zonk(&ty);
      guard::check_primitive(self.ctx, PrimOp::Eq, &ty)?;
      match ty.as_data() {
        TypeData::Prim(_) | TypeData::Meta(_) => {},
        _ => return Err(self.mismatch(&term, &Type::int(), &ty)),
      }
    }
    Ok(())
  }

  pub fn check(&mut self, t: &Term, expected: &Type) -> TcResult<()> {
    if let TermData::Lam(x, ann, body) = t.as_data() {
      let resolved = self.resolve(expected);
      if let TypeData::Arrow(dom, cod) = resolved.as_data() {
        if let Some(ann) = ann {
          self.check_type(ann)?;
          if !self.unify(ann, dom) {
            let found = Type::arrow(ann.clone(), self.fresh_meta());
            return Err(self.mismatch(t, expected, &found));
          }
        }
        self.push_local(x.clone(), dom.clone());
        let res = self.check(body, cod);
        self.pop_local();
        return res;
      }
    }
    let found = self.infer(t)?;
    if self.unify(&found, expected) { Ok(()) } else { Err(self.mismatch(t, expected, &found)) }
  }
}

/// Infer the type of a closed term. Positions the term leaves unconstrained
/// remain metavariables.
pub fn type_of(ctx: &Context, term: &Term) -> TcResult<Type> {
  let mut tc = TypeChecker::new(ctx);
  let ty = tc.infer(term)?;
  tc.finish()?;
  Ok(tc.zonk(&ty))
}
