//! Kernel for contract-defined abstract types.
//!
//! Types are declared by their constructors and eliminators, with equations
//! giving each eliminator's action on each constructor. The kernel checks
//! declarations, reduces terms by rewriting with those equations, and checks
//! concrete representations against the equations.

pub mod block;
pub mod config;
pub mod context;
pub mod decl;
pub mod def_eq;
pub mod error;
pub mod expr;
pub mod guard;
pub mod name;
pub mod repr;
pub mod subst;
pub mod tc;
pub mod whnf;

#[cfg(test)]
pub(crate) mod fixtures;
