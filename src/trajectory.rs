//! Recorded trajectories: raw (sample, timestep, joint) batches and the flattened
//! training set derived from them.

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::{Result, SysIdError};

/// Joint angles, velocities and commanded torques of several recorded runs,
/// each indexed `[sample, timestep, joint]` with identical extents.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryBatch {
    angles: Array3<f64>,
    velocities: Array3<f64>,
    torques: Array3<f64>,
}

impl TrajectoryBatch {
    pub fn new(angles: Array3<f64>, velocities: Array3<f64>, torques: Array3<f64>) -> Result<Self> {
        let expected = angles.shape().to_vec();
        for (what, channel) in [("velocities", &velocities), ("torques", &torques)] {
            if channel.shape() != expected.as_slice() {
                return Err(SysIdError::shape(what, &expected, channel.shape()));
            }
        }
        Ok(TrajectoryBatch {
            angles,
            velocities,
            torques,
        })
    }

    /// Same as [`TrajectoryBatch::new`], additionally requiring `dof` joints.
    pub fn with_dof(
        angles: Array3<f64>,
        velocities: Array3<f64>,
        torques: Array3<f64>,
        dof: usize,
    ) -> Result<Self> {
        let batch = Self::new(angles, velocities, torques)?;
        if batch.dof() != dof {
            let (samples, timesteps, found) = batch.angles.dim();
            return Err(SysIdError::shape("angles", &[samples, timesteps, dof], &[samples, timesteps, found]));
        }
        Ok(batch)
    }

    pub fn samples(&self) -> usize {
        self.angles.len_of(Axis(0))
    }

    pub fn timesteps(&self) -> usize {
        self.angles.len_of(Axis(1))
    }

    pub fn dof(&self) -> usize {
        self.angles.len_of(Axis(2))
    }

    pub fn angles(&self) -> &Array3<f64> {
        &self.angles
    }

    pub fn velocities(&self) -> &Array3<f64> {
        &self.velocities
    }

    pub fn torques(&self) -> &Array3<f64> {
        &self.torques
    }

    /// Splits off the first `count` samples, e.g. to hold them out for validation.
    pub fn split_samples(&self, count: usize) -> Result<(TrajectoryBatch, TrajectoryBatch)> {
        if count > self.samples() {
            return Err(SysIdError::InvalidArgument(format!(
                "cannot split {} samples off a batch of {}",
                count,
                self.samples()
            )));
        }
        let part = |range: std::ops::Range<usize>| TrajectoryBatch {
            angles: self.angles.slice_axis(Axis(0), range.clone().into()).to_owned(),
            velocities: self.velocities.slice_axis(Axis(0), range.clone().into()).to_owned(),
            torques: self.torques.slice_axis(Axis(0), range.into()).to_owned(),
        };
        Ok((part(0..count), part(count..self.samples())))
    }
}

/// Training set: one row per (sample, timestep) pair, aligned across channels.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatSamples {
    pub angles: Array2<f64>,
    pub velocities: Array2<f64>,
    pub accelerations: Array2<f64>,
    pub torques: Array2<f64>,
}

impl FlatSamples {
    pub fn rows(&self) -> usize {
        self.angles.nrows()
    }

    pub fn dof(&self) -> usize {
        self.angles.ncols()
    }

    /// Checks that every channel has the same number of rows and `dof` columns.
    pub fn validate(&self, dof: usize) -> Result<()> {
        let expected = [self.rows(), dof];
        for (what, channel) in self.channels() {
            if channel.dim() != (expected[0], expected[1]) {
                return Err(SysIdError::shape(what, &expected, channel.shape()));
            }
        }
        Ok(())
    }

    fn channels(&self) -> [(&'static str, ArrayView2<'_, f64>); 4] {
        [
            ("angles", self.angles.view()),
            ("velocities", self.velocities.view()),
            ("accelerations", self.accelerations.view()),
            ("torques", self.torques.view()),
        ]
    }
}
