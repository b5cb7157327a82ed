//! Serialization for names, types, terms and context entries.
//!
//! Every node starts with a Tag4 header whose flag picks the variant and
//! whose size carries the variant's count or small payload. Names are
//! Tag0-length-prefixed UTF-8.

#![allow(clippy::cast_possible_truncation)]

use crate::kernel::context::{
  Backing, ConstructorDecl, EliminatorDecl, Entry, EquationDecl, OperationImpl, RepresentationDecl,
  TypeDecl,
};
use crate::kernel::expr::{Literal, PrimOp, PrimType, Term, TermData, Type, TypeData};
use crate::kernel::name::Name;

use super::tag::{Tag0, Tag4, unzigzag, zigzag};

const TYPE_VAR: u8 = 0;
const TYPE_META: u8 = 1;
const TYPE_CONST: u8 = 2;
const TYPE_ARROW: u8 = 3;
const TYPE_PRIM: u8 = 4;
const TYPE_TUPLE: u8 = 5;

const TERM_VAR: u8 = 0;
const TERM_APP: u8 = 1;
const TERM_LAM: u8 = 2;
const TERM_ANN: u8 = 3;
const TERM_CTOR: u8 = 4;
const TERM_ELIM: u8 = 5;
const TERM_INT: u8 = 6;
const TERM_BOOL: u8 = 7;
const TERM_PRIM: u8 = 8;
const TERM_TUPLE: u8 = 9;
const TERM_PROJ: u8 = 10;

const ENTRY_TYPE: u8 = 0;
const ENTRY_CTOR: u8 = 1;
const ENTRY_ELIM: u8 = 2;
const ENTRY_EQUATION: u8 = 3;
const ENTRY_REPR: u8 = 4;
const ENTRY_IMPL: u8 = 5;

const BACKING_INT: u8 = 0;
const BACKING_BOOL: u8 = 1;
const BACKING_TUPLE: u8 = 2;

// ============================================================================
// Primitive helpers
// ============================================================================

/// Cap capacity for Vec allocation during deserialization. Each item takes
/// at least one byte, so a count larger than the buffer is a lie.
#[inline]
pub(crate) fn capped_capacity(count: u64, buf: &[u8]) -> usize {
  (count as usize).min(buf.len())
}

pub(crate) fn put_u64(x: u64, buf: &mut Vec<u8>) {
  Tag0::new(x).put(buf);
}

pub(crate) fn get_u64(buf: &mut &[u8]) -> Result<u64, String> {
  Ok(Tag0::get(buf)?.size)
}

pub fn put_name(name: &Name, buf: &mut Vec<u8>) {
  let bytes = name.as_str().as_bytes();
  put_u64(bytes.len() as u64, buf);
  buf.extend_from_slice(bytes);
}

pub fn get_name(buf: &mut &[u8]) -> Result<Name, String> {
  let len = get_u64(buf)? as usize;
  let Some((bytes, rest)) = buf.split_at_checked(len) else {
    return Err(format!("get_name: need {len} bytes, have {}", buf.len()));
  };
  *buf = rest;
  let s = std::str::from_utf8(bytes).map_err(|e| format!("get_name: {e}"))?;
  Ok(Name::new(s))
}

fn get_vec<T>(
  count: u64,
  buf: &mut &[u8],
  get: impl Fn(&mut &[u8]) -> Result<T, String>,
) -> Result<Vec<T>, String> {
  let mut out = Vec::with_capacity(capped_capacity(count, buf));
  for _ in 0..count {
    out.push(get(buf)?);
  }
  Ok(out)
}

fn prim_op_index(op: PrimOp) -> u64 {
  PrimOp::ALL.iter().position(|o| *o == op).unwrap_or_default() as u64
}

// ============================================================================
// Types
// ============================================================================

pub fn put_type(ty: &Type, buf: &mut Vec<u8>) {
  match ty.as_data() {
    TypeData::Var(v) => {
      Tag4::new(TYPE_VAR, 0).put(buf);
      put_name(v, buf);
    },
    TypeData::Meta(id) => Tag4::new(TYPE_META, u64::from(*id)).put(buf),
    TypeData::Const(name, args) => {
      Tag4::new(TYPE_CONST, args.len() as u64).put(buf);
      put_name(name, buf);
      for a in args {
        put_type(a, buf);
      }
    },
    TypeData::Arrow(dom, cod) => {
      Tag4::new(TYPE_ARROW, 0).put(buf);
      put_type(dom, buf);
      put_type(cod, buf);
    },
    TypeData::Prim(p) => {
      let code = match p {
        PrimType::Int => 0,
        PrimType::Bool => 1,
      };
      Tag4::new(TYPE_PRIM, code).put(buf);
    },
    TypeData::Tuple(elems) => {
      Tag4::new(TYPE_TUPLE, elems.len() as u64).put(buf);
      for e in elems {
        put_type(e, buf);
      }
    },
  }
}

pub fn get_type(buf: &mut &[u8]) -> Result<Type, String> {
  let tag = Tag4::get(buf)?;
  match tag.flag {
    TYPE_VAR => Ok(Type::var(get_name(buf)?)),
    // Metavariables live only inside a running checker.
    TYPE_META => Err(format!("get_type: metavariable ?{} in stored type", tag.size)),
    TYPE_CONST => {
      let name = get_name(buf)?;
      Ok(Type::cnst(name, get_vec(tag.size, buf, get_type)?))
    },
    TYPE_ARROW => {
      let dom = get_type(buf)?;
      Ok(Type::arrow(dom, get_type(buf)?))
    },
    TYPE_PRIM => match tag.size {
      0 => Ok(Type::int()),
      1 => Ok(Type::bool()),
      x => Err(format!("get_type: invalid primitive type {x}")),
    },
    TYPE_TUPLE => Ok(Type::tuple(get_vec(tag.size, buf, get_type)?)),
    x => Err(format!("get_type: invalid flag {x}")),
  }
}

// ============================================================================
// Terms
// ============================================================================

pub fn put_term(t: &Term, buf: &mut Vec<u8>) {
  match t.as_data() {
    TermData::Var(v) => {
      Tag4::new(TERM_VAR, 0).put(buf);
      put_name(v, buf);
    },
    TermData::App(f, a) => {
      Tag4::new(TERM_APP, 0).put(buf);
      put_term(f, buf);
      put_term(a, buf);
    },
    TermData::Lam(x, ann, body) => {
      Tag4::new(TERM_LAM, u64::from(ann.is_some())).put(buf);
      put_name(x, buf);
      if let Some(ty) = ann {
        put_type(ty, buf);
      }
      put_term(body, buf);
    },
    TermData::Ann(term, ty) => {
      Tag4::new(TERM_ANN, 0).put(buf);
      put_term(term, buf);
      put_type(ty, buf);
    },
    TermData::Ctor(c, args) => {
      Tag4::new(TERM_CTOR, args.len() as u64).put(buf);
      put_name(c, buf);
      for a in args {
        put_term(a, buf);
      }
    },
    TermData::Elim(e, scrut, args) => {
      Tag4::new(TERM_ELIM, args.len() as u64).put(buf);
      put_name(e, buf);
      put_term(scrut, buf);
      for a in args {
        put_term(a, buf);
      }
    },
    TermData::Lit(Literal::Int(i)) => Tag4::new(TERM_INT, zigzag(*i)).put(buf),
    TermData::Lit(Literal::Bool(b)) => Tag4::new(TERM_BOOL, u64::from(*b)).put(buf),
    TermData::Prim(op, args) => {
      Tag4::new(TERM_PRIM, prim_op_index(*op)).put(buf);
      put_u64(args.len() as u64, buf);
      for a in args {
        put_term(a, buf);
      }
    },
    TermData::Tuple(elems) => {
      Tag4::new(TERM_TUPLE, elems.len() as u64).put(buf);
      for e in elems {
        put_term(e, buf);
      }
    },
    TermData::Proj(term, idx) => {
      Tag4::new(TERM_PROJ, *idx as u64).put(buf);
      put_term(term, buf);
    },
  }
}

pub fn get_term(buf: &mut &[u8]) -> Result<Term, String> {
  let tag = Tag4::get(buf)?;
  match tag.flag {
    TERM_VAR => Ok(Term::var(get_name(buf)?)),
    TERM_APP => {
      let f = get_term(buf)?;
      Ok(Term::app(f, get_term(buf)?))
    },
    TERM_LAM => {
      let x = get_name(buf)?;
      match tag.size {
        0 => Ok(Term::lam(x, get_term(buf)?)),
        1 => {
          let ty = get_type(buf)?;
          Ok(Term::lam_ann(x, ty, get_term(buf)?))
        },
        s => Err(format!("get_term: invalid lambda annotation marker {s}")),
      }
    },
    TERM_ANN => {
      let term = get_term(buf)?;
      Ok(Term::ann(term, get_type(buf)?))
    },
    TERM_CTOR => {
      let c = get_name(buf)?;
      Ok(Term::ctor(c, get_vec(tag.size, buf, get_term)?))
    },
    TERM_ELIM => {
      let e = get_name(buf)?;
      let scrut = get_term(buf)?;
      Ok(Term::elim(e, scrut, get_vec(tag.size, buf, get_term)?))
    },
    TERM_INT => Ok(Term::int(unzigzag(tag.size))),
    TERM_BOOL => match tag.size {
      0 => Ok(Term::boolean(false)),
      1 => Ok(Term::boolean(true)),
      x => Err(format!("get_term: invalid boolean {x}")),
    },
    TERM_PRIM => {
      let Some(op) = PrimOp::ALL.get(tag.size as usize).copied() else {
        return Err(format!("get_term: invalid primitive op {}", tag.size));
      };
      let count = get_u64(buf)?;
      Ok(Term::prim(op, get_vec(count, buf, get_term)?))
    },
    TERM_TUPLE => Ok(Term::tuple(get_vec(tag.size, buf, get_term)?)),
    TERM_PROJ => Ok(Term::proj(get_term(buf)?, tag.size as usize)),
    x => Err(format!("get_term: invalid flag {x}")),
  }
}

// ============================================================================
// Entries
// ============================================================================

pub fn put_backing(b: &Backing, buf: &mut Vec<u8>) {
  match b {
    Backing::Int => Tag4::new(BACKING_INT, 0).put(buf),
    Backing::Bool => Tag4::new(BACKING_BOOL, 0).put(buf),
    Backing::Tuple(elems) => {
      Tag4::new(BACKING_TUPLE, elems.len() as u64).put(buf);
      for e in elems {
        put_backing(e, buf);
      }
    },
  }
}

pub fn get_backing(buf: &mut &[u8]) -> Result<Backing, String> {
  let tag = Tag4::get(buf)?;
  match tag.flag {
    BACKING_INT => Ok(Backing::Int),
    BACKING_BOOL => Ok(Backing::Bool),
    BACKING_TUPLE => Ok(Backing::Tuple(get_vec(tag.size, buf, get_backing)?)),
    x => Err(format!("get_backing: invalid flag {x}")),
  }
}

/// Constructors and eliminators are stored as name and signature; owning
/// type and motive are recomputed on decode.
pub fn put_entry(entry: &Entry, buf: &mut Vec<u8>) {
  match entry {
    Entry::Type(t) => {
      Tag4::new(ENTRY_TYPE, t.arity as u64).put(buf);
      put_name(&t.name, buf);
    },
    Entry::Constructor(c) => {
      Tag4::new(ENTRY_CTOR, 0).put(buf);
      put_name(&c.name, buf);
      put_type(&c.signature, buf);
    },
    Entry::Eliminator(e) => {
      Tag4::new(ENTRY_ELIM, 0).put(buf);
      put_name(&e.name, buf);
      put_type(&e.signature, buf);
    },
    Entry::Equation(eq) => {
      Tag4::new(ENTRY_EQUATION, eq.bound_vars.len() as u64).put(buf);
      put_name(&eq.eliminator, buf);
      put_name(&eq.constructor, buf);
      for v in &eq.bound_vars {
        put_name(v, buf);
      }
      put_term(&eq.rhs, buf);
    },
    Entry::Representation(r) => {
      Tag4::new(ENTRY_REPR, 0).put(buf);
      put_name(&r.type_name, buf);
      put_backing(&r.backing, buf);
    },
    Entry::Impl(i) => {
      Tag4::new(ENTRY_IMPL, 0).put(buf);
      put_name(&i.op, buf);
      put_term(&i.expr, buf);
    },
  }
}

pub fn get_entry(buf: &mut &[u8]) -> Result<Entry, String> {
  let tag = Tag4::get(buf)?;
  match tag.flag {
    ENTRY_TYPE => {
      let name = get_name(buf)?;
      Ok(Entry::Type(TypeDecl { name, arity: tag.size as usize }))
    },
    ENTRY_CTOR => {
      let name = get_name(buf)?;
      let sig = get_type(buf)?;
      ConstructorDecl::from_signature(name, sig).map(Entry::Constructor).map_err(|e| e.to_string())
    },
    ENTRY_ELIM => {
      let name = get_name(buf)?;
      let sig = get_type(buf)?;
      EliminatorDecl::from_signature(name, sig).map(Entry::Eliminator).map_err(|e| e.to_string())
    },
    ENTRY_EQUATION => {
      let eliminator = get_name(buf)?;
      let constructor = get_name(buf)?;
      let bound_vars = get_vec(tag.size, buf, get_name)?;
      let rhs = get_term(buf)?;
      Ok(Entry::Equation(EquationDecl { eliminator, constructor, bound_vars, rhs }))
    },
    ENTRY_REPR => {
      let type_name = get_name(buf)?;
      let backing = get_backing(buf)?;
      Ok(Entry::Representation(RepresentationDecl { type_name, backing }))
    },
    ENTRY_IMPL => {
      let op = get_name(buf)?;
      let expr = get_term(buf)?;
      Ok(Entry::Impl(OperationImpl { op, expr }))
    },
    x => Err(format!("get_entry: invalid flag {x}")),
  }
}
