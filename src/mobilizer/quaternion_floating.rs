use nalgebra::{Isometry3, Quaternion, RealField, Translation3, UnitQuaternion, Vector3};

use super::{HingeMatrixViewMut, Mobilizer};
use crate::index::FrameIndex;
use crate::spatial::{SpatialAcceleration, SpatialForce, SpatialVelocity};

/// Six degrees of freedom with the orientation parameterized by a quaternion.
///
/// `q = [qw, qx, qy, qz, px, py, pz]` holds the orientation `R_FM` and the position `p_FoMo_F`;
/// `v = [w_FM_F, v_FMo_F]` holds the angular velocity and the velocity of `Mo`, both measured and
/// expressed in `F`. The hinge matrix is therefore the identity.
#[derive(Clone, Debug)]
pub struct QuaternionFloatingMobilizer<T: RealField + Copy> {
    inboard_frame: FrameIndex,
    outboard_frame: FrameIndex,
    _scalar: std::marker::PhantomData<T>,
}

impl<T: RealField + Copy> QuaternionFloatingMobilizer<T> {
    pub fn new(inboard_frame: FrameIndex, outboard_frame: FrameIndex) -> Self {
        Self {
            inboard_frame,
            outboard_frame,
            _scalar: std::marker::PhantomData,
        }
    }

    fn raw_quaternion(q: &[T]) -> Quaternion<T> {
        Quaternion::new(q[0], q[1], q[2], q[3])
    }

    /// The orientation stored in `q`, normalized.
    pub fn quaternion(&self, q: &[T]) -> UnitQuaternion<T> {
        UnitQuaternion::from_quaternion(Self::raw_quaternion(q))
    }

    pub fn position(&self, q: &[T]) -> Vector3<T> {
        Vector3::new(q[4], q[5], q[6])
    }

    pub fn set_quaternion(&self, q: &mut [T], quaternion: &UnitQuaternion<T>) {
        q[0] = quaternion.w;
        q[1] = quaternion.i;
        q[2] = quaternion.j;
        q[3] = quaternion.k;
    }

    pub fn set_position(&self, q: &mut [T], position: &Vector3<T>) {
        q[4..7].copy_from_slice(position.as_slice());
    }

    pub fn set_pose(&self, q: &mut [T], x_fm: &Isometry3<T>) {
        self.set_quaternion(q, &x_fm.rotation);
        self.set_position(q, &x_fm.translation.vector);
    }

    pub fn set_angular_velocity(&self, v: &mut [T], w_fm: &Vector3<T>) {
        v[0..3].copy_from_slice(w_fm.as_slice());
    }

    pub fn set_translational_velocity(&self, v: &mut [T], v_fm: &Vector3<T>) {
        v[3..6].copy_from_slice(v_fm.as_slice());
    }

    pub fn set_spatial_velocity(&self, v: &mut [T], v_fm: &SpatialVelocity<T>) {
        self.set_angular_velocity(v, &v_fm.rotational);
        self.set_translational_velocity(v, &v_fm.translational);
    }
}

impl<T: RealField + Copy> Mobilizer<T> for QuaternionFloatingMobilizer<T> {
    fn inboard_frame(&self) -> FrameIndex {
        self.inboard_frame
    }

    fn outboard_frame(&self) -> FrameIndex {
        self.outboard_frame
    }

    fn num_positions(&self) -> usize {
        7
    }

    fn num_velocities(&self) -> usize {
        6
    }

    fn type_name(&self) -> &'static str {
        "quaternion_floating"
    }

    fn set_zero_configuration(&self, q: &mut [T]) {
        q[..7].fill(T::zero());
        q[0] = T::one();
    }

    fn calc_across_mobilizer_transform(&self, q: &[T]) -> Isometry3<T> {
        Isometry3::from_parts(Translation3::from(self.position(q)), self.quaternion(q))
    }

    fn calc_across_mobilizer_spatial_velocity(&self, _q: &[T], v: &[T]) -> SpatialVelocity<T> {
        SpatialVelocity::new(Vector3::new(v[0], v[1], v[2]), Vector3::new(v[3], v[4], v[5]))
    }

    fn calc_across_mobilizer_spatial_acceleration(&self, _q: &[T], _v: &[T], vdot: &[T]) -> SpatialAcceleration<T> {
        SpatialAcceleration::new(
            Vector3::new(vdot[0], vdot[1], vdot[2]),
            Vector3::new(vdot[3], vdot[4], vdot[5]),
        )
    }

    fn project_spatial_force(&self, _q: &[T], f_mo_f: &SpatialForce<T>, tau: &mut [T]) {
        tau[..6].copy_from_slice(f_mo_f.to_vector6().as_slice());
    }

    fn calc_hinge_matrix(&self, _q: &[T], h_fm: &mut HingeMatrixViewMut<'_, T>) {
        h_fm.fill_with_identity();
    }

    fn map_qdot_to_velocity(&self, q: &[T], qdot: &[T], v: &mut [T]) {
        // w = 2 q̇ q* / |q|², which tolerates a quaternion drifting off the unit sphere.
        let quaternion = Self::raw_quaternion(q);
        let two = T::one() + T::one();
        let rate = Quaternion::new(qdot[0], qdot[1], qdot[2], qdot[3]);
        let w = (rate * quaternion.conjugate()).imag() * (two / quaternion.norm_squared());
        v[0..3].copy_from_slice(w.as_slice());
        v[3..6].copy_from_slice(&qdot[4..7]);
    }

    fn map_velocity_to_qdot(&self, q: &[T], v: &[T], qdot: &mut [T]) {
        let half: T = nalgebra::convert(0.5);
        let rate = Quaternion::from_imag(Vector3::new(v[0], v[1], v[2])) * Self::raw_quaternion(q) * half;
        qdot[0] = rate.w;
        qdot[1] = rate.i;
        qdot[2] = rate.j;
        qdot[3] = rate.k;
        qdot[4..7].copy_from_slice(&v[3..6]);
    }

    fn as_quaternion_floating(&self) -> Option<&QuaternionFloatingMobilizer<T>> {
        Some(self)
    }
}
