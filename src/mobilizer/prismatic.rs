use nalgebra::{Isometry3, RealField, Translation3, Unit, UnitQuaternion, Vector3};

use super::{HingeMatrixViewMut, Mobilizer};
use crate::errors::{Result, TreeError};
use crate::index::FrameIndex;
use crate::spatial::{SpatialAcceleration, SpatialForce, SpatialVelocity};

/// One translational degree of freedom along an axis fixed in `F`, with `M` keeping the orientation of `F`.
#[derive(Clone, Debug)]
pub struct PrismaticMobilizer<T: RealField + Copy> {
    inboard_frame: FrameIndex,
    outboard_frame: FrameIndex,
    axis_f: Unit<Vector3<T>>,
}

impl<T: RealField + Copy> PrismaticMobilizer<T> {
    /// Fails with [`TreeError::ZeroAxis`] when `axis_f` cannot be normalized.
    pub fn new(inboard_frame: FrameIndex, outboard_frame: FrameIndex, axis_f: Vector3<T>) -> Result<Self> {
        let axis_f = Unit::try_new(axis_f, T::default_epsilon()).ok_or(TreeError::ZeroAxis("prismatic"))?;
        Ok(Self {
            inboard_frame,
            outboard_frame,
            axis_f,
        })
    }

    pub fn axis(&self) -> &Vector3<T> {
        self.axis_f.as_ref()
    }
}

impl<T: RealField + Copy> Mobilizer<T> for PrismaticMobilizer<T> {
    fn inboard_frame(&self) -> FrameIndex {
        self.inboard_frame
    }

    fn outboard_frame(&self) -> FrameIndex {
        self.outboard_frame
    }

    fn num_positions(&self) -> usize {
        1
    }

    fn num_velocities(&self) -> usize {
        1
    }

    fn type_name(&self) -> &'static str {
        "prismatic"
    }

    fn set_zero_configuration(&self, q: &mut [T]) {
        q[0] = T::zero();
    }

    fn calc_across_mobilizer_transform(&self, q: &[T]) -> Isometry3<T> {
        Isometry3::from_parts(Translation3::from(self.axis() * q[0]), UnitQuaternion::identity())
    }

    fn calc_across_mobilizer_spatial_velocity(&self, _q: &[T], v: &[T]) -> SpatialVelocity<T> {
        SpatialVelocity::new(Vector3::zeros(), self.axis() * v[0])
    }

    fn calc_across_mobilizer_spatial_acceleration(&self, _q: &[T], _v: &[T], vdot: &[T]) -> SpatialAcceleration<T> {
        SpatialAcceleration::new(Vector3::zeros(), self.axis() * vdot[0])
    }

    fn project_spatial_force(&self, _q: &[T], f_mo_f: &SpatialForce<T>, tau: &mut [T]) {
        tau[0] = self.axis().dot(&f_mo_f.translational);
    }

    fn calc_hinge_matrix(&self, _q: &[T], h_fm: &mut HingeMatrixViewMut<'_, T>) {
        h_fm.fill(T::zero());
        h_fm.fixed_view_mut::<3, 1>(3, 0).copy_from(self.axis());
    }

    fn map_qdot_to_velocity(&self, _q: &[T], qdot: &[T], v: &mut [T]) {
        v[0] = qdot[0];
    }

    fn map_velocity_to_qdot(&self, _q: &[T], v: &[T], qdot: &mut [T]) {
        qdot[0] = v[0];
    }
}
