//! Context entries and the context store.
//!
//! The context is an append log of entries plus name indices into it. Blocks
//! (see `block`) are the only way entries get in; a failed block truncates
//! the log back to where it started.

use std::ops::Range;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::error::{KernelError, NameError};
use super::expr::{PrimType, Term, Type, TypeData};
use super::name::Name;

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
  pub name: Name,
  pub arity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDecl {
  pub name: Name,
  pub signature: Type,
  pub owning_type: Name,
}

impl ConstructorDecl {
  /// Build a constructor whose owning type is read off the signature's
  /// result.
  pub fn from_signature(name: impl Into<Name>, signature: Type) -> Result<Self, KernelError> {
    let name = name.into();
    let (_, result) = signature.unfold_arrows();
    match result.head_const() {
      Some((owner, _)) => {
        let owning_type = owner.clone();
        Ok(ConstructorDecl { name, signature, owning_type })
      },
      None => Err(KernelError::malformed(
        &name,
        format!("constructor result {result} is not a declared type"),
      )),
    }
  }

  /// Field types, in order.
  pub fn fields(&self) -> Vec<Type> {
    self.signature.unfold_arrows().0
  }

  /// Type variables the result type is applied to.
  pub fn params(&self) -> Vec<Name> {
    let (_, result) = self.signature.unfold_arrows();
    match result.as_data() {
      TypeData::Const(_, args) => args
        .iter()
        .filter_map(|a| match a.as_data() {
          TypeData::Var(v) => Some(v.clone()),
          _ => None,
        })
        .collect(),
      _ => vec![],
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminatorDecl {
  pub name: Name,
  pub signature: Type,
  pub owning_type: Name,
  /// Result type variable of a case eliminator; `None` for observers.
  pub motive: Option<Name>,
}

impl EliminatorDecl {
  /// Build an eliminator from its signature. The owning type comes from the
  /// first argument; the eliminator is a case eliminator when its result is
  /// a type variable that is not one of the scrutinee's parameters.
  pub fn from_signature(name: impl Into<Name>, signature: Type) -> Result<Self, KernelError> {
    let name = name.into();
    let (doms, result) = signature.unfold_arrows();
    let scrutinee = match doms.first() {
      Some(s) => s,
      None => {
        return Err(KernelError::malformed(&name, "eliminator takes no scrutinee"));
      },
    };
    let (owner, params) = match scrutinee.head_const() {
      Some(head) => head,
      None => {
        return Err(KernelError::malformed(
          &name,
          format!("scrutinee {scrutinee} is not a declared type"),
        ));
      },
    };
    let motive = match result.as_data() {
      TypeData::Var(v) if !params.iter().any(|p| p.type_vars().contains(v)) => {
        Some(v.clone())
      },
      _ => None,
    };
    Ok(EliminatorDecl { name, owning_type: owner.clone(), signature, motive })
  }

  /// Argument types after the scrutinee.
  pub fn rest_args(&self) -> Vec<Type> {
    let (mut doms, _) = self.signature.unfold_arrows();
    if !doms.is_empty() {
      doms.remove(0);
    }
    doms
  }

  pub fn scrutinee(&self) -> Option<Type> {
    self.signature.unfold_arrows().0.into_iter().next()
  }

  pub fn result(&self) -> Type {
    self.signature.unfold_arrows().1
  }

  pub fn is_case(&self) -> bool {
    self.motive.is_some()
  }
}

/// `eliminator (constructor fields..) args.. = rhs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationDecl {
  pub eliminator: Name,
  pub constructor: Name,
  /// Constructor fields first, then the eliminator's remaining arguments.
  pub bound_vars: Vec<Name>,
  pub rhs: Term,
}

/// Concrete layout backing an abstract type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Backing {
  Int,
  Bool,
  Tuple(Vec<Backing>),
}

impl Backing {
  pub fn to_type(&self) -> Type {
    match self {
      Backing::Int => Type::prim(PrimType::Int),
      Backing::Bool => Type::prim(PrimType::Bool),
      Backing::Tuple(elems) => Type::tuple(elems.iter().map(Backing::to_type).collect()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepresentationDecl {
  pub type_name: Name,
  pub backing: Backing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationImpl {
  pub op: Name,
  pub expr: Term,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
  Type(TypeDecl),
  Constructor(ConstructorDecl),
  Eliminator(EliminatorDecl),
  Equation(EquationDecl),
  Representation(RepresentationDecl),
  Impl(OperationImpl),
}

impl Entry {
  /// The name this entry claims in the global namespace, if any.
  pub fn declared_name(&self) -> Option<&Name> {
    match self {
      Entry::Type(t) => Some(&t.name),
      Entry::Constructor(c) => Some(&c.name),
      Entry::Eliminator(e) => Some(&e.name),
      _ => None,
    }
  }

  pub fn kind_str(&self) -> &'static str {
    match self {
      Entry::Type(_) => "type",
      Entry::Constructor(_) => "constructor",
      Entry::Eliminator(_) => "eliminator",
      Entry::Equation(_) => "equation",
      Entry::Representation(_) => "representation",
      Entry::Impl(_) => "implementation",
    }
  }
}

// ============================================================================
// Context
// ============================================================================

/// Committed declarations. Cloning gives an independent snapshot.
#[derive(Debug, Clone, Default)]
pub struct Context {
  pub(crate) entries: Vec<Entry>,
  pub(crate) blocks: Vec<Range<usize>>,
  /// Types, constructors and eliminators, in log order.
  pub(crate) names: IndexMap<Name, usize>,
  pub(crate) ctors: FxHashMap<Name, Vec<Name>>,
  pub(crate) elims: FxHashMap<Name, Vec<Name>>,
  pub(crate) equations: IndexMap<(Name, Name), usize>,
  pub(crate) representations: IndexMap<Name, usize>,
  pub(crate) impls: IndexMap<Name, usize>,
}

impl Context {
  pub fn new() -> Self {
    Context::default()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn lookup(&self, name: &Name) -> Result<&Entry, NameError> {
    self
      .names
      .get(name)
      .map(|&idx| &self.entries[idx])
      .ok_or_else(|| NameError::Unknown(name.clone()))
  }

  pub fn contains(&self, name: &Name) -> bool {
    self.names.contains_key(name)
  }

  /// Log position of a named entry.
  pub fn position(&self, name: &Name) -> Option<usize> {
    self.names.get(name).copied()
  }

  pub fn type_decl(&self, name: &Name) -> Result<&TypeDecl, KernelError> {
    match self.lookup(name)? {
      Entry::Type(t) => Ok(t),
      other => Err(KernelError::malformed(name, format!("is a {}, not a type", other.kind_str()))),
    }
  }

  pub fn constructor(&self, name: &Name) -> Result<&ConstructorDecl, KernelError> {
    match self.lookup(name)? {
      Entry::Constructor(c) => Ok(c),
      other => Err(KernelError::malformed(
        name,
        format!("is a {}, not a constructor", other.kind_str()),
      )),
    }
  }

  pub fn eliminator(&self, name: &Name) -> Result<&EliminatorDecl, KernelError> {
    match self.lookup(name)? {
      Entry::Eliminator(e) => Ok(e),
      other => Err(KernelError::malformed(
        name,
        format!("is a {}, not an eliminator", other.kind_str()),
      )),
    }
  }

  pub fn is_type(&self, name: &Name) -> bool {
    matches!(self.lookup(name), Ok(Entry::Type(_)))
  }

  /// Constructors of `type_name` in declaration order.
  pub fn constructors_of(&self, type_name: &Name) -> &[Name] {
    self.ctors.get(type_name).map_or(&[], Vec::as_slice)
  }

  /// Eliminators of `type_name` in declaration order.
  pub fn eliminators_of(&self, type_name: &Name) -> &[Name] {
    self.elims.get(type_name).map_or(&[], Vec::as_slice)
  }

  pub fn equation(&self, eliminator: &Name, constructor: &Name) -> Option<&EquationDecl> {
    let idx = self.equations.get(&(eliminator.clone(), constructor.clone()))?;
    match &self.entries[*idx] {
      Entry::Equation(eq) => Some(eq),
      _ => None,
    }
  }

  pub fn representation(&self, type_name: &Name) -> Option<&RepresentationDecl> {
    let idx = self.representations.get(type_name)?;
    match &self.entries[*idx] {
      Entry::Representation(r) => Some(r),
      _ => None,
    }
  }

  pub fn implementation(&self, op: &Name) -> Option<&OperationImpl> {
    let idx = self.impls.get(op)?;
    match &self.entries[*idx] {
      Entry::Impl(i) => Some(i),
      _ => None,
    }
  }

  /// Owning type of a constructor or eliminator.
  pub fn owner_of(&self, op: &Name) -> Option<&Name> {
    match self.lookup(op).ok()? {
      Entry::Constructor(c) => Some(&c.owning_type),
      Entry::Eliminator(e) => Some(&e.owning_type),
      _ => None,
    }
  }

  /// Committed blocks, oldest first.
  pub fn blocks(&self) -> impl Iterator<Item = &[Entry]> + '_ {
    self.blocks.iter().map(|r| &self.entries[r.clone()])
  }

  pub fn entries(&self) -> &[Entry] {
    &self.entries
  }

  /// Reject `entry` if its key is already taken by the context or by one of
  /// `staged`. Equations are not checked here: duplicates surface as
  /// overlapping equations at commit.
  pub fn check_fresh(&self, entry: &Entry, staged: &[Entry]) -> Result<(), NameError> {
    if let Some(name) = entry.declared_name() {
      let clash = self.names.contains_key(name)
        || staged.iter().any(|s| s.declared_name() == Some(name));
      return if clash { Err(NameError::Duplicate(name.clone())) } else { Ok(()) };
    }
    match entry {
      Entry::Type(_) | Entry::Constructor(_) | Entry::Eliminator(_) | Entry::Equation(_) => {
        Ok(())
      },
      Entry::Representation(r) => {
        let clash = self.representations.contains_key(&r.type_name)
          || staged.iter().any(|s| {
            matches!(s, Entry::Representation(o) if o.type_name == r.type_name)
          });
        if clash { Err(NameError::Duplicate(r.type_name.clone())) } else { Ok(()) }
      },
      Entry::Impl(i) => {
        let clash = self.impls.contains_key(&i.op)
          || staged.iter().any(|s| matches!(s, Entry::Impl(o) if o.op == i.op));
        if clash { Err(NameError::Duplicate(i.op.clone())) } else { Ok(()) }
      },
    }
  }

  // ==========================================================================
  // Installation and rollback (driven by `Block::commit`)
  // ==========================================================================

  /// Append a named entry and index it.
  pub(crate) fn install_named(&mut self, entry: Entry) {
    let idx = self.entries.len();
    match &entry {
      Entry::Type(t) => {
        self.names.insert(t.name.clone(), idx);
      },
      Entry::Constructor(c) => {
        self.names.insert(c.name.clone(), idx);
        self.ctors.entry(c.owning_type.clone()).or_default().push(c.name.clone());
      },
      Entry::Eliminator(e) => {
        self.names.insert(e.name.clone(), idx);
        self.elims.entry(e.owning_type.clone()).or_default().push(e.name.clone());
      },
      _ => {},
    }
    self.entries.push(entry);
  }

  /// Append an equation, representation or implementation and index it.
  pub(crate) fn install_keyed(&mut self, entry: Entry) {
    let idx = self.entries.len();
    match &entry {
      Entry::Equation(eq) => {
        self.equations.insert((eq.eliminator.clone(), eq.constructor.clone()), idx);
      },
      Entry::Representation(r) => {
        self.representations.insert(r.type_name.clone(), idx);
      },
      Entry::Impl(i) => {
        self.impls.insert(i.op.clone(), idx);
      },
      _ => {},
    }
    self.entries.push(entry);
  }

  /// Drop every entry at or after log position `mark`. Only valid while no
  /// keyed entry has been installed past `mark`.
  pub(crate) fn truncate(&mut self, mark: usize) {
    self.entries.truncate(mark);
    self.names.retain(|_, idx| *idx < mark);
    let names = &self.names;
    for list in self.ctors.values_mut().chain(self.elims.values_mut()) {
      list.retain(|n| names.contains_key(n));
    }
    self.ctors.retain(|owner, list| !list.is_empty() && names.contains_key(owner));
    self.elims.retain(|owner, list| !list.is_empty() && names.contains_key(owner));
  }

  /// Empty blocks leave no trace in the log.
  pub(crate) fn record_block(&mut self, range: Range<usize>) {
    if !range.is_empty() {
      self.blocks.push(range);
    }
  }
}
