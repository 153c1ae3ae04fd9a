//! Token accounting across an agent run.
//!
//! Providers report usage per model call. A [`TokenTally`] folds those
//! reports into running totals for the whole run; totals only ever grow.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Running input/output token totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTally {
    pub input: u64,
    pub output: u64,
    /// Whether any usage was reported yet.
    #[serde(skip)]
    reported: bool,
}

impl TokenTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one step's usage into the totals. Missing counts add nothing.
    pub fn record(&mut self, input: Option<u64>, output: Option<u64>) {
        if input.is_none() && output.is_none() {
            return;
        }
        self.input = self.input.saturating_add(input.unwrap_or(0));
        self.output = self.output.saturating_add(output.unwrap_or(0));
        self.reported = true;
        debug!("Token totals: in={}, out={}", self.input, self.output);
    }

    /// Totals, or `None` before the provider reported anything.
    pub fn totals(&self) -> Option<(u64, u64)> {
        self.reported.then_some((self.input, self.output))
    }

    /// Format as a compact summary string.
    pub fn summary(&self) -> String {
        format!("{}↓ {}↑", format_count(self.input), format_count(self.output))
    }
}

/// Format an integer with `,` thousands separators.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
