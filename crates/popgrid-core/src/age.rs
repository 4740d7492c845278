//! Age bands.
//!
//! Breakpoints `b_0 < b_1 < … < b_n` define bands `[b_i, b_{i+1})` labelled
//! `[b_i;b_{i+1}[` and a terminal open band labelled `b_n+`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ascending age boundaries (years).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct AgeBreakpoints(Vec<u32>);

impl AgeBreakpoints {
    pub fn new(breaks: Vec<u32>) -> Result<Self> {
        if breaks.is_empty() {
            return Err(Error::Config("age breakpoints must not be empty".into()));
        }
        if let Some(w) = breaks.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::Config(format!(
                "age breakpoints must be strictly ascending ({} then {})",
                w[0], w[1]
            )));
        }
        Ok(Self(breaks))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl Default for AgeBreakpoints {
    /// 0, 1, 5, 10, …, 80: infants, the 1–4 group, then five-year bands.
    fn default() -> Self {
        let mut breaks = vec![0, 1];
        breaks.extend((5..=80).step_by(5));
        Self(breaks)
    }
}

impl TryFrom<Vec<u32>> for AgeBreakpoints {
    type Error = Error;

    fn try_from(breaks: Vec<u32>) -> Result<Self> {
        Self::new(breaks)
    }
}

impl From<AgeBreakpoints> for Vec<u32> {
    fn from(b: AgeBreakpoints) -> Self {
        b.0
    }
}

/// Lookup from an age to its band label, built once from breakpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeClasses {
    /// Band lower bound → label.
    bands: BTreeMap<u32, String>,
}

impl AgeClasses {
    pub fn new(breakpoints: &AgeBreakpoints) -> Self {
        let b = breakpoints.as_slice();
        let mut bands = BTreeMap::new();
        for w in b.windows(2) {
            bands.insert(w[0], format!("[{};{}[", w[0], w[1]));
        }
        if let Some(&last) = b.last() {
            bands.insert(last, format!("{last}+"));
        }
        Self { bands }
    }

    /// Label of the band containing `age`; None below the first breakpoint.
    pub fn label(&self, age: u32) -> Option<&str> {
        self.bands.range(..=age).next_back().map(|(_, l)| l.as_str())
    }

    /// Like [`label`](Self::label) but reports ages outside every band.
    pub fn classify(&self, age: u32) -> Result<&str> {
        self.label(age)
            .ok_or_else(|| Error::Schema(format!("age {age} falls outside every configured age band")))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}
