//! Post-run verification of the stored reference.

use crate::store::SqliteStore;
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;

/// Functions every complete Pulseq reference holds.
pub const DEFAULT_SAMPLES: &[&str] = &["makeTrapezoid", "makeSincPulse", "makeBlockPulse", "opts", "makeAdc"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCheck {
    pub name: String,
    /// `(required, optional)` counts when found
    pub counts: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub samples: Vec<SampleCheck>,
    pub by_type: BTreeMap<String, usize>,
}

impl VerifyReport {
    pub fn total(&self) -> usize {
        self.by_type.values().sum()
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.samples
            .iter()
            .filter(|s| s.counts.is_none())
            .map(|s| s.name.as_str())
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sample in &self.samples {
            match sample.counts {
                Some((required, optional)) => writeln!(
                    f,
                    "  ✓ {}: {} required, {} optional params",
                    sample.name, required, optional
                )?,
                None => writeln!(f, "  ✗ {}: not found in database", sample.name)?,
            }
        }
        writeln!(f, "\nFunctions in database by type:")?;
        for (kind, count) in &self.by_type {
            writeln!(f, "  {}: {}", kind, count)?;
        }
        write!(f, "  Total: {}", self.total())
    }
}

pub fn verify(store: &SqliteStore, samples: &[String], language: &str, version: &str) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();
    for name in samples {
        let counts = store
            .get(name, language, version)?
            .map(|f| (f.required_count(), f.optional_count()));
        report.samples.push(SampleCheck {
            name: name.clone(),
            counts,
        });
    }
    report.by_type = store.count_by_type(language, version)?;
    Ok(report)
}
