//! Variable-length headers for the context log.
//!
//! Every node in the log opens with a single header byte. A [`Tag4`] spends
//! its high nibble on the node kind, a [`Tag0`] is a bare count. Sizes too
//! large for the header spill into little-endian bytes right after it and
//! the header records how many of them follow.

/// Bytes needed to write `x` with its high zero bytes dropped.
fn width(x: u64) -> usize {
  (u64::BITS - x.leading_zeros()).div_ceil(8) as usize
}

/// Emit a header whose low `bits` bits carry `size` inline, or the spill
/// width minus one when the top one of them is set.
#[allow(clippy::cast_possible_truncation)]
fn put_header(high: u8, bits: u32, size: u64, buf: &mut Vec<u8>) {
  let spill = 1u8 << (bits - 1);
  if size < u64::from(spill) {
    buf.push(high | size as u8);
  } else {
    let n = width(size);
    buf.push(high | spill | (n - 1) as u8);
    buf.extend_from_slice(&size.to_le_bytes()[..n]);
  }
}

/// Read a header written by `put_header`, returning its high bits and size.
fn get_header(bits: u32, buf: &mut &[u8]) -> Result<(u8, u64), String> {
  let Some((&head, rest)) = buf.split_first() else {
    return Err("header: unexpected end of input".to_string());
  };
  *buf = rest;
  let spill = 1u8 << (bits - 1);
  let low_mask = (spill << 1).wrapping_sub(1);
  let (high, low) = (head & !low_mask, head & low_mask);
  if low & spill == 0 {
    return Ok((high, u64::from(low)));
  }
  let n = usize::from(low & !spill) + 1;
  if n > 8 {
    return Err(format!("header: {n} size bytes do not fit a u64"));
  }
  let Some((bytes, rest)) = buf.split_at_checked(n) else {
    return Err(format!("header: need {n} size bytes, {} left", buf.len()));
  };
  *buf = rest;
  let mut le = [0u8; 8];
  le[..n].copy_from_slice(bytes);
  Ok((high, u64::from_le_bytes(le)))
}

/// Map signed integers onto unsigned ones so small magnitudes stay short.
pub fn zigzag(x: i64) -> u64 {
  ((x << 1) ^ (x >> 63)) as u64
}

pub fn unzigzag(x: u64) -> i64 {
  ((x >> 1) as i64) ^ -((x & 1) as i64)
}

/// Node header: kind in the high nibble, then a spill bit and three size
/// bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag4 {
  pub flag: u8,
  pub size: u64,
}

impl Tag4 {
  pub fn new(flag: u8, size: u64) -> Self {
    debug_assert!(flag < 16, "node kind {flag} does not fit a nibble");
    Tag4 { flag, size }
  }

  pub fn put(&self, buf: &mut Vec<u8>) {
    put_header(self.flag << 4, 4, self.size, buf)
  }

  pub fn get(buf: &mut &[u8]) -> Result<Self, String> {
    let (high, size) = get_header(4, buf)?;
    Ok(Tag4 { flag: high >> 4, size })
  }
}

/// Count header: a spill bit and seven size bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag0 {
  pub size: u64,
}

impl Tag0 {
  pub fn new(size: u64) -> Self {
    Tag0 { size }
  }

  pub fn put(&self, buf: &mut Vec<u8>) {
    put_header(0, 8, self.size, buf)
  }

  pub fn get(buf: &mut &[u8]) -> Result<Self, String> {
    let (_, size) = get_header(8, buf)?;
    Ok(Tag0 { size })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use quickcheck::{Arbitrary, Gen};

  impl Arbitrary for Tag4 {
    fn arbitrary(g: &mut Gen) -> Self {
      Tag4::new(u8::arbitrary(g) % 16, u64::arbitrary(g))
    }
  }

  fn encoded<F: FnOnce(&mut Vec<u8>)>(put: F) -> Vec<u8> {
    let mut buf = Vec::new();
    put(&mut buf);
    buf
  }

  #[quickcheck]
  fn prop_tag4_roundtrip(t: Tag4) -> bool {
    let buf = encoded(|b| t.put(b));
    Tag4::get(&mut buf.as_slice()) == Ok(t)
  }

  #[quickcheck]
  fn prop_tag0_roundtrip(size: u64) -> bool {
    let buf = encoded(|b| Tag0::new(size).put(b));
    Tag0::get(&mut buf.as_slice()) == Ok(Tag0::new(size))
  }

  #[quickcheck]
  fn prop_zigzag_roundtrip(x: i64) -> bool {
    unzigzag(zigzag(x)) == x
  }

  #[test]
  fn zigzag_keeps_small_magnitudes_small() {
    assert_eq!(zigzag(0), 0);
    assert_eq!(zigzag(-1), 1);
    assert_eq!(zigzag(1), 2);
    assert_eq!(zigzag(-2), 3);
    assert_eq!(zigzag(i64::MIN), u64::MAX);
  }

  #[test]
  fn node_headers_spill_past_seven() {
    let cases: [(u64, usize); 8] = [
      (0, 1),
      (7, 1),
      (8, 2),
      (0xFF, 2),
      (0x100, 3),
      (0xFFFF_FFFF, 5),
      (0x1_0000_0000, 6),
      (u64::MAX, 9),
    ];
    for (size, expected) in cases {
      for flag in [0u8, 5, 15] {
        let tag = Tag4::new(flag, size);
        let buf = encoded(|b| tag.put(b));
        assert_eq!(buf.len(), expected, "Tag4({flag}, 0x{size:X})");
        let mut slice: &[u8] = &buf;
        assert_eq!(Tag4::get(&mut slice), Ok(tag));
        assert!(slice.is_empty());
      }
    }
  }

  #[test]
  fn count_headers_spill_past_127() {
    assert_eq!(encoded(|b| Tag0::new(127).put(b)), vec![0x7F]);
    assert_eq!(encoded(|b| Tag0::new(128).put(b)), vec![0x80, 0x80]);
    assert_eq!(encoded(|b| Tag0::new(0x1_0000).put(b)).len(), 4);
  }

  #[test]
  fn truncated_input_is_an_error() {
    let mut buf = encoded(|b| Tag4::new(3, 0xFFFF).put(b));
    buf.pop();
    assert!(Tag4::get(&mut buf.as_slice()).is_err());
    let mut empty: &[u8] = &[];
    assert!(Tag0::get(&mut empty).is_err());
    // A count header claiming nine size bytes.
    assert!(Tag0::get(&mut [0x88u8, 0, 0, 0, 0, 0, 0, 0, 0, 0].as_slice()).is_err());
  }
}
