use std::fmt;
use std::sync::Arc;

/// An identifier for variables, types, constructors and eliminators.
///
/// Cloning is a reference-count bump; equality and hashing go through the
/// underlying string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(Arc<str>);

impl Name {
  pub fn new(s: impl AsRef<str>) -> Self {
    Name(Arc::from(s.as_ref()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The name with any `'N` freshening suffix removed.
  pub fn base(&self) -> &str {
    match self.0.rfind('\'') {
      Some(idx)
        if idx > 0
          && idx + 1 < self.0.len()
          && self.0[idx + 1..].bytes().all(|b| b.is_ascii_digit()) =>
      {
        &self.0[..idx]
      },
      _ => &self.0,
    }
  }

  /// First variant `base'1`, `base'2`, ... for which `taken` is false.
  pub fn freshen(&self, taken: impl Fn(&Name) -> bool) -> Name {
    let base = self.base();
    let mut i: u64 = 1;
    loop {
      let candidate = Name::new(format!("{base}'{i}"));
      if !taken(&candidate) {
        return candidate;
      }
      i += 1;
    }
  }
}

impl From<&str> for Name {
  fn from(s: &str) -> Self {
    Name::new(s)
  }
}

impl From<String> for Name {
  fn from(s: String) -> Self {
    Name(Arc::from(s))
  }
}

impl fmt::Display for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl fmt::Debug for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "`{}`", self.0)
  }
}
