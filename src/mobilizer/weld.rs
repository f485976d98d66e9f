use nalgebra::{Isometry3, RealField};

use super::Mobilizer;
use crate::index::FrameIndex;
use crate::spatial::{SpatialAcceleration, SpatialForce, SpatialVelocity};

/// Rigidly attaches the outboard frame to the inboard frame at a fixed offset `X_FM`.
#[derive(Clone, Debug)]
pub struct WeldMobilizer<T: RealField + Copy> {
    inboard_frame: FrameIndex,
    outboard_frame: FrameIndex,
    x_fm: Isometry3<T>,
}

impl<T: RealField + Copy> WeldMobilizer<T> {
    pub fn new(inboard_frame: FrameIndex, outboard_frame: FrameIndex, x_fm: Isometry3<T>) -> Self {
        Self {
            inboard_frame,
            outboard_frame,
            x_fm,
        }
    }

    pub fn x_fm(&self) -> &Isometry3<T> {
        &self.x_fm
    }
}

impl<T: RealField + Copy> Mobilizer<T> for WeldMobilizer<T> {
    fn inboard_frame(&self) -> FrameIndex {
        self.inboard_frame
    }

    fn outboard_frame(&self) -> FrameIndex {
        self.outboard_frame
    }

    fn num_positions(&self) -> usize {
        0
    }

    fn num_velocities(&self) -> usize {
        0
    }

    fn type_name(&self) -> &'static str {
        "weld"
    }

    fn set_zero_configuration(&self, _q: &mut [T]) {}

    fn calc_across_mobilizer_transform(&self, _q: &[T]) -> Isometry3<T> {
        self.x_fm
    }

    fn calc_across_mobilizer_spatial_velocity(&self, _q: &[T], _v: &[T]) -> SpatialVelocity<T> {
        SpatialVelocity::zero()
    }

    fn calc_across_mobilizer_spatial_acceleration(&self, _q: &[T], _v: &[T], _vdot: &[T]) -> SpatialAcceleration<T> {
        SpatialAcceleration::zero()
    }

    fn project_spatial_force(&self, _q: &[T], _f_mo_f: &SpatialForce<T>, _tau: &mut [T]) {}

    fn map_qdot_to_velocity(&self, _q: &[T], _qdot: &[T], _v: &mut [T]) {}

    fn map_velocity_to_qdot(&self, _q: &[T], _v: &[T], _qdot: &mut [T]) {}
}
