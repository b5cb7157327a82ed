//! Contype: a kernel for abstract types defined by their observable
//! behaviour, with checked concrete representations.

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod kernel;
pub mod session;
pub mod store;

pub use kernel::config::KernelConfig;
pub use kernel::context::{Backing, Context, Entry};
pub use kernel::error::{ErrorKind, KernelError};
pub use kernel::expr::{Literal, PrimOp, PrimType, Term, Type};
pub use kernel::name::Name;
pub use kernel::repr::{EquationVerdict, FaithfulnessMode, FaithfulnessReport};
pub use session::Session;
