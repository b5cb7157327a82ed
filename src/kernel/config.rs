/// Tunables shared by the checker, the rewriter and the faithfulness checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
  /// Reduction steps a single normalization may take before giving up with
  /// `NonTerminating`.
  pub fuel: u64,
  /// Upper bound on sample combinations tried per equation.
  pub max_sample_cases: usize,
}

impl KernelConfig {
  pub const DEFAULT_FUEL: u64 = 10_000;
  pub const DEFAULT_MAX_SAMPLE_CASES: usize = 4_096;

  pub fn with_fuel(mut self, fuel: u64) -> Self {
    self.fuel = fuel;
    self
  }

  pub fn with_max_sample_cases(mut self, cases: usize) -> Self {
    self.max_sample_cases = cases;
    self
  }
}

impl Default for KernelConfig {
  fn default() -> Self {
    KernelConfig {
      fuel: Self::DEFAULT_FUEL,
      max_sample_cases: Self::DEFAULT_MAX_SAMPLE_CASES,
    }
  }
}
