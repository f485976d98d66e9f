//! Mobilizers: the runtime primitives that map a local slice of generalized positions and velocities to
//! the relative motion of an outboard frame `M` with respect to an inboard frame `F`.
//!
//! All methods receive only the slices owned by the mobilizer. Spatial quantities are measured in `F`,
//! expressed in `F` and taken about the origin `Mo`.

mod prismatic;
mod quaternion_floating;
mod revolute;
mod weld;

use std::fmt::Debug;

use nalgebra::{Dyn, Isometry3, MatrixViewMut, RealField, U1, U6};

use crate::index::FrameIndex;
use crate::spatial::{SpatialAcceleration, SpatialForce, SpatialVelocity};

pub use prismatic::PrismaticMobilizer;
pub use quaternion_floating::QuaternionFloatingMobilizer;
pub use revolute::RevoluteMobilizer;
pub use weld::WeldMobilizer;

/// A mutable 6xk block of a hinge-matrix buffer, with the rotational rows first.
pub type HingeMatrixViewMut<'a, T> = MatrixViewMut<'a, T, U6, Dyn, U1, U6>;

/// Capability shared by all joint kinds.
pub trait Mobilizer<T: RealField + Copy>: Debug + Send + Sync {
    /// Frame `F` on the inboard (parent) body.
    fn inboard_frame(&self) -> FrameIndex;

    /// Frame `M` on the outboard (child) body.
    fn outboard_frame(&self) -> FrameIndex;

    fn num_positions(&self) -> usize;

    fn num_velocities(&self) -> usize;

    fn type_name(&self) -> &'static str;

    /// Writes the configuration for which `X_FM` is the identity (or the fixed offset of a weld).
    fn set_zero_configuration(&self, q: &mut [T]);

    fn calc_across_mobilizer_transform(&self, q: &[T]) -> Isometry3<T>;

    fn calc_across_mobilizer_spatial_velocity(&self, q: &[T], v: &[T]) -> SpatialVelocity<T>;

    fn calc_across_mobilizer_spatial_acceleration(&self, q: &[T], v: &[T], vdot: &[T]) -> SpatialAcceleration<T>;

    /// Generalized forces `tau = H_FMᵀ F_Mo_F` for a spatial force applied on `M` at `Mo`.
    fn project_spatial_force(&self, q: &[T], f_mo_f: &SpatialForce<T>, tau: &mut [T]);

    /// Writes `H_FM`, column `i` being the across-mobilizer velocity for a unit velocity `v_i`.
    fn calc_hinge_matrix(&self, q: &[T], h_fm: &mut HingeMatrixViewMut<'_, T>) {
        let mut unit = vec![T::zero(); self.num_velocities()];
        for i in 0..unit.len() {
            unit[i] = T::one();
            let column = self.calc_across_mobilizer_spatial_velocity(q, &unit).to_vector6();
            h_fm.set_column(i, &column);
            unit[i] = T::zero();
        }
    }

    fn map_qdot_to_velocity(&self, q: &[T], qdot: &[T], v: &mut [T]);

    fn map_velocity_to_qdot(&self, q: &[T], v: &[T], qdot: &mut [T]);

    /// Downcast used by the free-body setters.
    fn as_quaternion_floating(&self) -> Option<&QuaternionFloatingMobilizer<T>> {
        None
    }
}
