//! Source time functions.
//!
//! The sample interval belongs to the run, not to the source, so it is an
//! argument of every operation here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceTimeFunction {
    /// Identity: traces pass through unchanged.
    #[default]
    Dirac,
    /// Isosceles triangle of total length `2 * half_duration`.
    Triangle { half_duration: f64 },
}

impl SourceTimeFunction {
    /// Discrete kernel normalized to unit sum.
    pub fn samples(&self, dt: f64) -> Vec<f64> {
        match *self {
            SourceTimeFunction::Dirac => vec![1.0],
            SourceTimeFunction::Triangle { half_duration } => {
                if !(dt > 0.0) || !(half_duration > 0.0) {
                    return vec![1.0];
                }
                let half = (half_duration / dt).round().max(1.0) as usize;
                let raw: Vec<f64> = (0..=2 * half)
                    .map(|k| 1.0 - (k as f64 - half as f64).abs() / half as f64)
                    .collect();
                let sum: f64 = raw.iter().sum();
                raw.into_iter().map(|v| v / sum).collect()
            }
        }
    }

    /// Causal convolution, truncated to the input length.
    pub fn convolve(&self, data: &[f64], dt: f64) -> Vec<f64> {
        let kernel = self.samples(dt);
        if kernel.len() == 1 {
            return data.iter().map(|v| v * kernel[0]).collect();
        }
        let mut out = vec![0.0; data.len()];
        for (i, slot) in out.iter_mut().enumerate() {
            let taps = kernel.len().min(i + 1);
            *slot = (0..taps).map(|k| kernel[k] * data[i - k]).sum();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirac_is_identity() {
        let data = vec![0.0, 1.0, -2.0, 3.5];
        assert_eq!(SourceTimeFunction::Dirac.convolve(&data, 0.05), data);
    }

    #[test]
    fn triangle_preserves_area_of_a_step() {
        let stf = SourceTimeFunction::Triangle { half_duration: 0.1 };
        let kernel = stf.samples(0.05);
        assert_eq!(kernel.len(), 5);
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let step = vec![1.0; 10];
        let out = stf.convolve(&step, 0.05);
        assert_eq!(out.len(), 10);
        assert!((out[9] - 1.0).abs() < 1e-12);
        assert!(out[0] < out[9]);
    }

    #[test]
    fn parses_tagged_form() {
        let stf: SourceTimeFunction =
            serde_json::from_str(r#"{"kind":"triangle","half_duration":0.5}"#)
                .expect("stf should parse");
        assert_eq!(stf, SourceTimeFunction::Triangle { half_duration: 0.5 });
    }
}
