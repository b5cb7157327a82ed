use thiserror::Error;

use super::expr::{Term, Type};
use super::name::Name;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
  #[error("duplicate declaration: {0}")]
  Duplicate(Name),
  #[error("unknown name: {0}")]
  Unknown(Name),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
  #[error("unbound variable: {0}")]
  UnboundVariable(Name),
  #[error("argument {arg} of {function} has type {found}, expected {expected}")]
  ApplicationMismatch { function: Term, arg: Term, expected: Type, found: Type },
  #[error("{term} has type {found} and cannot be applied")]
  NotAFunction { term: Term, found: Type },
  #[error("type mismatch for {term}: expected {expected}, found {found}")]
  TypeMismatch { term: Term, expected: Type, found: Type },
  #[error("constructor {constructor} takes {expected} arguments, got {found}")]
  ConstructorArityMismatch { constructor: Name, expected: usize, found: usize },
  #[error("eliminator {eliminator} takes {expected} arguments after the scrutinee, got {found}")]
  EliminatorArityMismatch { eliminator: Name, expected: usize, found: usize },
  #[error("branch {branch} of {eliminator} returns {found}, but the motive is {expected}")]
  MotiveMismatch { eliminator: Name, branch: usize, expected: Type, found: Type },
  #[error("type {name} takes {expected} parameters, got {found}")]
  TypeArityMismatch { name: Name, expected: usize, found: usize },
  #[error("primitive {op} takes {expected} arguments, got {found}")]
  PrimArityMismatch { op: &'static str, expected: usize, found: usize },
  #[error("projection .{index} out of range for {found}")]
  ProjectionOutOfRange { index: usize, found: Type },
  #[error("{name} is not a type")]
  NotAType { name: Name },
  #[error("metavariable {ty} cannot appear in a written type")]
  MetaInAnnotation { ty: Type },
}

/// A counterexample to an equation under a representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterexample {
  /// Values given to the equation's bound variables; variables left
  /// symbolic are absent.
  pub bindings: Vec<(Name, Term)>,
  /// Normal form of the eliminator application under the implementations.
  pub lhs: Term,
  /// Normal form of the equation's right-hand side under the implementations.
  pub rhs: Term,
}

impl std::fmt::Display for Counterexample {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, (n, v)) in self.bindings.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{n} = {v}")?;
    }
    write!(f, "]: {} /= {}", self.lhs, self.rhs)
  }
}

/// Coarse classification of kernel errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Name,
  Arity,
  TypeMismatch,
  NonExhaustiveEquations,
  OverlappingEquations,
  MotiveMismatch,
  NonTerminating,
  AbstractionViolation,
  RepresentationMismatch,
  Malformed,
  Decode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
  #[error(transparent)]
  Name(#[from] NameError),
  #[error(transparent)]
  Type(#[from] TypeError),
  #[error("eliminator {eliminator} has no equation for {}", join(missing))]
  NonExhaustiveEquations { eliminator: Name, missing: Vec<Name> },
  #[error("eliminator {eliminator} has more than one equation for {constructor}")]
  OverlappingEquations { eliminator: Name, constructor: Name },
  #[error(
    "equation {eliminator}/{constructor} binds {found} variables, expected {expected}"
  )]
  EquationArityMismatch {
    eliminator: Name,
    constructor: Name,
    expected: usize,
    found: usize,
  },
  #[error("normalization ran out of fuel after {fuel} steps")]
  NonTerminating { fuel: u64 },
  #[error("abstraction violation on {type_name}: {reason}")]
  AbstractionViolation { type_name: Name, reason: String },
  #[error(
    "representation of {type_name} violates {eliminator}/{constructor} at {counterexample}"
  )]
  RepresentationMismatch {
    type_name: Name,
    eliminator: Name,
    constructor: Name,
    counterexample: Box<Counterexample>,
  },
  #[error("malformed declaration {name}: {msg}")]
  MalformedDeclaration { name: Name, msg: String },
  #[error("representation of {type_name} is missing {}", join(missing))]
  IncompleteRepresentation { type_name: Name, missing: Vec<Name> },
  #[error("{type_name} must be committed before it can be represented")]
  UnregisteredType { type_name: Name },
  #[error("could not decide {eliminator}/{constructor} for {type_name} symbolically and no samples apply")]
  FaithfulnessUndecided { type_name: Name, eliminator: Name, constructor: Name },
  #[error("decode error: {0}")]
  Decode(String),
}

pub type TcResult<T> = Result<T, KernelError>;

fn join(names: &[Name]) -> String {
  names.iter().map(Name::to_string).collect::<Vec<_>>().join(", ")
}

impl KernelError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      KernelError::Name(_) => ErrorKind::Name,
      KernelError::Type(TypeError::ConstructorArityMismatch { .. })
      | KernelError::Type(TypeError::EliminatorArityMismatch { .. })
      | KernelError::Type(TypeError::TypeArityMismatch { .. })
      | KernelError::Type(TypeError::PrimArityMismatch { .. })
      | KernelError::EquationArityMismatch { .. } => ErrorKind::Arity,
      KernelError::Type(TypeError::MotiveMismatch { .. }) => ErrorKind::MotiveMismatch,
      KernelError::Type(_) => ErrorKind::TypeMismatch,
      KernelError::NonExhaustiveEquations { .. } => ErrorKind::NonExhaustiveEquations,
      KernelError::OverlappingEquations { .. } => ErrorKind::OverlappingEquations,
      KernelError::NonTerminating { .. } => ErrorKind::NonTerminating,
      KernelError::AbstractionViolation { .. } => ErrorKind::AbstractionViolation,
      KernelError::RepresentationMismatch { .. } => ErrorKind::RepresentationMismatch,
      KernelError::MalformedDeclaration { .. }
      | KernelError::IncompleteRepresentation { .. }
      | KernelError::UnregisteredType { .. }
      | KernelError::FaithfulnessUndecided { .. } => ErrorKind::Malformed,
      KernelError::Decode(_) => ErrorKind::Decode,
    }
  }

  pub fn malformed(name: &Name, msg: impl Into<String>) -> Self {
    KernelError::MalformedDeclaration { name: name.clone(), msg: msg.into() }
  }
}
