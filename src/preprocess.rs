//! Turns recorded trajectory batches into a flat, smoothed and subsampled training set.
//!
//! The stages are, in order:
//! 1. accelerations as the first difference of velocities along time (divided by the
//!    timestep); every other channel drops its last timestep to stay aligned,
//! 2. Gaussian smoothing of every channel along time,
//! 3. trimming a margin from both ends of the time axis,
//! 4. flattening (sample, timestep) into one row axis, sample-major, verified,
//! 5. a seeded random subset of rows, the same rows for every channel.

use ndarray::{s, Array2, Array3, ArrayView3, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Invariant, Result, SysIdError};
use crate::smoothing::smooth_along_time;
use crate::trajectory::{FlatSamples, TrajectoryBatch};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Upper bound on the number of rows in the training set.
    pub desired_sample_count: usize,
    /// Standard deviation of the smoothing kernel in timesteps. Zero disables smoothing.
    pub smoothing_sigma: f64,
    /// Timesteps removed from each end of every trajectory after smoothing.
    pub trim_margin: usize,
    /// Sampling period of the recordings in seconds.
    pub timestep: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            desired_sample_count: 1000,
            smoothing_sigma: 1.0,
            trim_margin: 1000,
            timestep: 0.001,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataPreprocessor {
    config: PreprocessConfig,
}

impl DataPreprocessor {
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        if !(config.timestep > 0.0) || !config.timestep.is_finite() {
            return Err(SysIdError::InvalidArgument(format!(
                "timestep must be positive and finite, got {}",
                config.timestep
            )));
        }
        if !config.smoothing_sigma.is_finite() {
            return Err(SysIdError::InvalidArgument(format!(
                "smoothing sigma must be finite, got {}",
                config.smoothing_sigma
            )));
        }
        Ok(DataPreprocessor { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn preprocess<R: Rng + ?Sized>(&self, batch: &TrajectoryBatch, rng: &mut R) -> Result<FlatSamples> {
        let timesteps = batch.timesteps();
        let length = timesteps.saturating_sub(1);
        let margin = self.config.trim_margin;
        if length <= 2 * margin {
            return Err(SysIdError::DegenerateTrim {
                available: length,
                margin,
            });
        }

        let velocities = batch.velocities();
        let accelerations = (&velocities.slice(s![.., 1.., ..]) - &velocities.slice(s![.., ..length, ..]))
            / self.config.timestep;
        let head = |channel: &Array3<f64>| channel.slice(s![.., ..length, ..]).to_owned();

        let sigma = self.config.smoothing_sigma;
        let smoothed = [
            smooth_along_time(&head(batch.angles()), sigma),
            smooth_along_time(&head(velocities), sigma),
            smooth_along_time(&accelerations, sigma),
            smooth_along_time(&head(batch.torques()), sigma),
        ];

        let trimmed_length = length - 2 * margin;
        debug!(
            "Preprocessing {} samples: {} timesteps, {} after differencing, {} after trimming",
            batch.samples(),
            timesteps,
            length,
            trimmed_length
        );

        let trim_and_flatten =
            |channel: &Array3<f64>| flatten(channel.slice(s![.., margin..length - margin, ..]));
        let [angles, velocities, accelerations, torques] = smoothed;
        let flat = [
            trim_and_flatten(&angles)?,
            trim_and_flatten(&velocities)?,
            trim_and_flatten(&accelerations)?,
            trim_and_flatten(&torques)?,
        ];

        let rows = batch.samples() * trimmed_length;
        let wanted = self.config.desired_sample_count;
        if wanted > rows {
            warn!("Requested {} training rows but only {} are available", wanted, rows);
        }
        let mut indices: Vec<usize> = (0..rows).collect();
        indices.shuffle(rng);
        indices.truncate(wanted.min(rows));
        debug!("Selected {} of {} flattened rows", indices.len(), rows);

        let [angles, velocities, accelerations, torques] =
            flat.map(|channel| channel.select(Axis(0), &indices));
        Ok(FlatSamples {
            angles,
            velocities,
            accelerations,
            torques,
        })
    }
}

/// Merges the sample and timestep axes of `[sample, timestep, joint]` so that row
/// `sample·timesteps + t` holds entry `(sample, t)`. The first, last and middle
/// entries are checked against that linearization.
pub fn flatten(channel: ArrayView3<f64>) -> Result<Array2<f64>> {
    let (samples, timesteps, dof) = channel.dim();
    let flat = channel
        .as_standard_layout()
        .into_owned()
        .into_shape((samples * timesteps, dof))
        .map_err(|e| SysIdError::InvalidArgument(format!("cannot flatten trajectory batch: {}", e)))?;

    if samples == 0 || timesteps == 0 {
        return Ok(flat);
    }
    let probes = [
        (0, 0),
        (samples - 1, timesteps - 1),
        (samples / 2, timesteps / 2),
    ];
    for (sample, t) in probes {
        let row = flat.row(sample * timesteps + t);
        let original = channel.slice(s![sample, t, ..]);
        let residual = row
            .iter()
            .zip(original.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        let identical = row.iter().zip(original.iter()).all(|(a, b)| a.to_bits() == b.to_bits());
        if !identical {
            return Err(SysIdError::ConsistencyViolation {
                invariant: Invariant::FlatteningLinearization,
                residual,
            });
        }
    }
    Ok(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array3, ShapeBuilder};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Entries encode their origin: angle = 1000·s + t + 0.1·j.
    fn batch(samples: usize, timesteps: usize) -> TrajectoryBatch {
        let shape = (samples, timesteps, 3);
        let angles = Array3::from_shape_fn(shape, |(s, t, j)| 1000.0 * s as f64 + t as f64 + 0.1 * j as f64);
        let velocities = Array3::from_shape_fn(shape, |(s, t, j)| 2.0 * (1000.0 * s as f64 + t as f64) + j as f64);
        let torques = angles.mapv(|x| -x);
        TrajectoryBatch::new(angles, velocities, torques).unwrap()
    }

    fn config(desired: usize, margin: usize) -> PreprocessConfig {
        PreprocessConfig {
            desired_sample_count: desired,
            smoothing_sigma: 0.0,
            trim_margin: margin,
            timestep: 0.5,
        }
    }

    #[test]
    fn test_flatten_is_sample_major() {
        let data = batch(4, 7);
        let flat = flatten(data.angles().view()).unwrap();
        assert_eq!(flat.dim(), (28, 3));
        for s in 0..4 {
            for t in 0..7 {
                for j in 0..3 {
                    assert_eq!(flat[[s * 7 + t, j]], data.angles()[[s, t, j]]);
                }
            }
        }
    }

    #[test]
    fn test_flatten_of_non_standard_layout() {
        let data = batch(3, 5);
        let trimmed = data.angles().slice(s![.., 1..4, ..]);
        let flat = flatten(trimmed).unwrap();
        assert_eq!(flat.dim(), (9, 3));
        assert_eq!(flat[[2 * 3 + 1, 2]], data.angles()[[2, 2, 2]]);

        let fortran = Array3::from_shape_fn((3, 5, 3).f(), |(s, t, j)| data.angles()[[s, t, j]]);
        assert_eq!(flatten(fortran.view()).unwrap(), flatten(data.angles().view()).unwrap());
    }

    #[test]
    fn test_rows_stay_aligned_across_channels() {
        let preprocessor = DataPreprocessor::new(config(10_000, 2)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let flat = preprocessor.preprocess(&batch(3, 20), &mut rng).unwrap();

        // 20 timesteps, 19 after differencing, 15 after trimming 2 on each side.
        assert_eq!(flat.rows(), 3 * 15);
        flat.validate(3).unwrap();
        for row in 0..flat.rows() {
            let origin = flat.angles[[row, 0]];
            let (s, t) = ((origin / 1000.0).floor() as usize, origin as usize % 1000);
            assert!((2..17).contains(&t), "trimmed timestep {} leaked", t);
            assert!(s < 3);
            assert_eq!(flat.velocities[[row, 1]], 2.0 * origin + 1.0);
            assert_eq!(flat.torques[[row, 2]], -(origin + 0.2));
            // Velocity grows by 2 per timestep of 0.5 s.
            assert_relative_eq!(flat.accelerations[[row, 0]], 4.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_subsample_size_and_reproducibility() {
        let preprocessor = DataPreprocessor::new(config(10, 1)).unwrap();
        let first = preprocessor.preprocess(&batch(2, 12), &mut StdRng::seed_from_u64(9)).unwrap();
        let again = preprocessor.preprocess(&batch(2, 12), &mut StdRng::seed_from_u64(9)).unwrap();
        let other = preprocessor.preprocess(&batch(2, 12), &mut StdRng::seed_from_u64(10)).unwrap();
        assert_eq!(first.rows(), 10);
        assert_eq!(first, again);
        assert_ne!(first.angles, other.angles);
    }

    #[test]
    fn test_degenerate_trim() {
        let preprocessor = DataPreprocessor::new(config(10, 5)).unwrap();
        let result = preprocessor.preprocess(&batch(2, 11), &mut StdRng::seed_from_u64(0));
        match result {
            Err(SysIdError::DegenerateTrim { available, margin }) => {
                assert_eq!((available, margin), (10, 5));
            }
            other => panic!("Expected DegenerateTrim, got {:?}", other),
        }
        // One more timestep leaves exactly one row per sample.
        let flat = preprocessor.preprocess(&batch(2, 12), &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(flat.rows(), 2);
    }

    #[test]
    fn test_default_trim_needs_long_recordings() {
        let preprocessor = DataPreprocessor::new(PreprocessConfig::default()).unwrap();
        let result = preprocessor.preprocess(&batch(5, 50), &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(SysIdError::DegenerateTrim { available: 49, margin: 1000 })));
    }

    #[test]
    fn test_invalid_timestep_rejected() {
        let mut bad = config(10, 1);
        bad.timestep = 0.0;
        assert!(matches!(DataPreprocessor::new(bad), Err(SysIdError::InvalidArgument(_))));
    }
}
