//! Binary persistence for contexts.
//!
//! A context is stored as its committed blocks, in order:
//!
//! ```text
//! version:u8  blocks:Tag0  ( entries:Tag0  entry* )*
//! ```
//!
//! Loading replays every block through the ordinary commit path, so a log
//! that was edited on disk is checked exactly like fresh declarations.

pub mod serialize;
pub mod tag;

use tracing::debug;

use crate::kernel::context::Context;
use crate::kernel::error::KernelError;

use serialize::{capped_capacity, get_entry, get_u64, put_entry, put_u64};

pub const FORMAT_VERSION: u8 = 1;

pub fn to_bytes(ctx: &Context) -> Vec<u8> {
  let mut buf = vec![FORMAT_VERSION];
  put_u64(ctx.blocks().count() as u64, &mut buf);
  for block in ctx.blocks() {
    put_u64(block.len() as u64, &mut buf);
    for entry in block {
      put_entry(entry, &mut buf);
    }
  }
  buf
}

pub fn from_bytes(bytes: &[u8]) -> Result<Context, KernelError> {
  let mut buf = bytes;
  let Some((&version, rest)) = buf.split_first() else {
    return Err(KernelError::Decode("from_bytes: empty input".to_string()));
  };
  if version != FORMAT_VERSION {
    return Err(KernelError::Decode(format!("from_bytes: unsupported version {version}")));
  }
  buf = rest;

  let mut ctx = Context::new();
  let count = get_u64(&mut buf).map_err(KernelError::Decode)?;
  for index in 0..count {
    let len = get_u64(&mut buf).map_err(KernelError::Decode)?;
    let mut entries = Vec::with_capacity(capped_capacity(len, buf));
    for _ in 0..len {
      entries.push(get_entry(&mut buf).map_err(KernelError::Decode)?);
    }
    let mut block = ctx.begin_block();
    for entry in entries {
      block.stage(entry)?;
    }
    if let Err(errors) = block.commit() {
      let msgs: Vec<String> = errors.iter().map(ToString::to_string).collect();
      return Err(KernelError::Decode(format!(
        "from_bytes: block {index} rejected: {}",
        msgs.join("; ")
      )));
    }
  }
  if !buf.is_empty() {
    return Err(KernelError::Decode(format!("from_bytes: {} trailing bytes", buf.len())));
  }
  debug!(blocks = count, entries = ctx.len(), "context loaded");
  Ok(ctx)
}
