//! Definitional equality.
//!
//! Two terms are definitionally equal when their normal forms are
//! alpha-equivalent. Syntactically alpha-equivalent terms short-circuit
//! without spending fuel.

use super::context::Context;
use super::error::TcResult;
use super::expr::Term;
use super::subst::alpha_equivalent;
use super::whnf::Rewriter;

pub fn def_eq(rw: &mut Rewriter<'_>, a: &Term, b: &Term) -> TcResult<bool> {
  if alpha_equivalent(a, b) {
    return Ok(true);
  }
  let na = rw.normalize(a)?;
  let nb = rw.normalize(b)?;
  Ok(alpha_equivalent(&na, &nb))
}

pub fn is_definitionally_equal(ctx: &Context, a: &Term, b: &Term, fuel: u64) -> TcResult<bool> {
  def_eq(&mut Rewriter::new(ctx, fuel), a, b)
}
