use nalgebra::DVector;
use serde::Serialize;
use std::fmt;

/// Read-only report of an estimate and its refutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSummary {
    pub treatment: String,
    pub outcome: String,
    pub estimand: Vec<String>,
    pub estimate: Vec<f64>,
    pub mean_estimate: f64,
    pub refutation: Vec<f64>,
    pub mean_refutation: f64,
}

impl EffectSummary {
    pub fn new(
        treatment: &str,
        outcome: &str,
        estimand: &[String],
        estimate: &DVector<f64>,
        refutation: &DVector<f64>,
    ) -> Self {
        Self {
            treatment: treatment.to_string(),
            outcome: outcome.to_string(),
            estimand: estimand.to_vec(),
            estimate: estimate.iter().copied().collect(),
            mean_estimate: mean(estimate),
            refutation: refutation.iter().copied().collect(),
            mean_refutation: mean(refutation),
        }
    }

    /// How far the mean effect moved under refutation.
    pub fn mean_shift(&self) -> f64 {
        self.mean_refutation - self.mean_estimate
    }
}

fn mean(values: &DVector<f64>) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.mean()
    }
}

struct Values<'a>(&'a [f64]);

impl fmt::Display for Values<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:.4}", v)?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for EffectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Causal Estimate")?;
        writeln!(f, "--------------")?;
        writeln!(f, "{}", Values(&self.estimate))?;
        writeln!(f, "Mean estimate: {:.6}", self.mean_estimate)?;
        writeln!(f)?;
        writeln!(f, "Refutation Results")?;
        writeln!(f, "-------------------")?;
        writeln!(f, "{}", Values(&self.refutation))?;
        write!(f, "Mean refutation: {:.6}", self.mean_refutation)
    }
}
