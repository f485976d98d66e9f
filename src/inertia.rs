//! Mass properties of rigid bodies and articulated sub-trees.

use nalgebra::{Matrix3, Matrix6, RealField, Scalar, UnitQuaternion, Vector3};

use crate::spatial::{SpatialAcceleration, SpatialForce, SpatialVelocity};

/// Spatial inertia of a rigid body about a point `P`, expressed in some frame `E`.
///
/// Stores the mass, the center of mass `p_PScm_E` and the rotational inertia `I_SP_E` taken about `P`
/// (not about the center of mass).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialInertia<T: Scalar> {
    mass: T,
    com: Vector3<T>,
    rotational: Matrix3<T>,
}

impl<T: RealField + Copy> SpatialInertia<T> {
    pub fn new(mass: T, com: Vector3<T>, rotational_about_origin: Matrix3<T>) -> Self {
        Self {
            mass,
            com,
            rotational: rotational_about_origin,
        }
    }

    /// Builds the inertia about the frame origin from a rotational inertia about the center of mass.
    pub fn from_central_inertia(mass: T, com: Vector3<T>, central: Matrix3<T>) -> Self {
        Self::new(mass, com, central + steiner(mass, &com))
    }

    pub fn point_mass(mass: T, position: Vector3<T>) -> Self {
        Self::from_central_inertia(mass, position, Matrix3::zeros())
    }

    pub fn solid_sphere(mass: T, radius: T) -> Self {
        let two_fifths: T = nalgebra::convert(0.4);
        let moment = two_fifths * mass * radius * radius;
        Self::new(mass, Vector3::zeros(), Matrix3::from_diagonal_element(moment))
    }

    /// Solid box centered at the frame origin with edge lengths along the frame axes.
    pub fn solid_box(mass: T, lx: T, ly: T, lz: T) -> Self {
        let twelve: T = nalgebra::convert(12.0);
        let twelfth = mass / twelve;
        let (x2, y2, z2) = (lx * lx, ly * ly, lz * lz);
        let diagonal = Vector3::new(y2 + z2, x2 + z2, x2 + y2) * twelfth;
        Self::new(mass, Vector3::zeros(), Matrix3::from_diagonal(&diagonal))
    }

    pub fn zero() -> Self {
        Self::new(T::zero(), Vector3::zeros(), Matrix3::zeros())
    }

    pub fn mass(&self) -> T {
        self.mass
    }

    pub fn com(&self) -> &Vector3<T> {
        &self.com
    }

    pub fn rotational_inertia(&self) -> &Matrix3<T> {
        &self.rotational
    }

    pub fn central_inertia(&self) -> Matrix3<T> {
        self.rotational - steiner(self.mass, &self.com)
    }

    /// Expresses the inertia in another frame, given `R_EF` from the current frame `F`.
    pub fn re_express(&self, rotation: &UnitQuaternion<T>) -> Self {
        let r = rotation.to_rotation_matrix();
        let r = r.matrix();
        Self::new(self.mass, r * self.com, r * self.rotational * r.transpose())
    }

    /// The same inertia taken about `Q`, given `p_PQ` in the expressed-in frame.
    pub fn shift(&self, p_pq: &Vector3<T>) -> Self {
        let com_from_q = self.com - p_pq;
        Self::new(self.mass, com_from_q, self.central_inertia() + steiner(self.mass, &com_from_q))
    }

    /// Spatial force `M * A` required to give the body the spatial acceleration `A` (no velocity terms).
    pub fn mul_acceleration(&self, acceleration: &SpatialAcceleration<T>) -> SpatialForce<T> {
        let (alpha, a) = (&acceleration.rotational, &acceleration.translational);
        SpatialForce::new(
            self.rotational * alpha + self.com.cross(a) * self.mass,
            (a - self.com.cross(alpha)) * self.mass,
        )
    }

    /// Spatial momentum `M * V` about the origin.
    pub fn mul_velocity(&self, velocity: &SpatialVelocity<T>) -> SpatialForce<T> {
        let (w, v) = (&velocity.rotational, &velocity.translational);
        SpatialForce::new(
            self.rotational * w + self.com.cross(v) * self.mass,
            (v - self.com.cross(w)) * self.mass,
        )
    }

    /// Gyroscopic and centripetal force of a body spinning with angular velocity `w`.
    pub fn dynamic_bias(&self, w: &Vector3<T>) -> SpatialForce<T> {
        SpatialForce::new(
            w.cross(&(self.rotational * w)),
            w.cross(&w.cross(&self.com)) * self.mass,
        )
    }

    /// The 6x6 matrix acting on spatial motion vectors with the rotational part first.
    pub fn to_matrix(&self) -> Matrix6<T> {
        let mc = self.com.cross_matrix() * self.mass;
        let mut matrix = Matrix6::zeros();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotational);
        matrix.fixed_view_mut::<3, 3>(0, 3).copy_from(&mc);
        matrix.fixed_view_mut::<3, 3>(3, 0).copy_from(&(-mc));
        matrix
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&Matrix3::from_diagonal_element(self.mass));
        matrix
    }
}

fn steiner<T: RealField + Copy>(mass: T, p: &Vector3<T>) -> Matrix3<T> {
    (Matrix3::from_diagonal_element(p.norm_squared()) - p * p.transpose()) * mass
}

/// Articulated-body inertia of a sub-tree about a point, as a dense symmetric 6x6 matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArticulatedBodyInertia<T: Scalar> {
    matrix: Matrix6<T>,
}

impl<T: RealField + Copy> ArticulatedBodyInertia<T> {
    pub fn new(matrix: Matrix6<T>) -> Self {
        Self { matrix }
    }

    pub fn zero() -> Self {
        Self::new(Matrix6::zeros())
    }

    pub fn matrix(&self) -> &Matrix6<T> {
        &self.matrix
    }

    /// The same inertia taken about `Q`, given `p_PQ`.
    pub fn shift(&self, p_pq: &Vector3<T>) -> Self {
        // Maps motion at Q to motion at P: v_P = v_Q + p_PQ x w.
        let mut phi = Matrix6::identity();
        phi.fixed_view_mut::<3, 3>(3, 0).copy_from(&p_pq.cross_matrix());
        Self::new(phi.transpose() * self.matrix * phi)
    }

    pub fn re_express(&self, rotation: &UnitQuaternion<T>) -> Self {
        let r = rotation.to_rotation_matrix().into_inner();
        let mut block = Matrix6::zeros();
        block.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        block.fixed_view_mut::<3, 3>(3, 3).copy_from(&r);
        Self::new(block * self.matrix * block.transpose())
    }

    pub fn mul_acceleration(&self, acceleration: &SpatialAcceleration<T>) -> SpatialForce<T> {
        SpatialForce::from_vector6(&(self.matrix * acceleration.to_vector6()))
    }
}

impl<T: RealField + Copy> From<SpatialInertia<T>> for ArticulatedBodyInertia<T> {
    fn from(inertia: SpatialInertia<T>) -> Self {
        Self::new(inertia.to_matrix())
    }
}

impl<T: RealField + Copy> std::ops::Add for ArticulatedBodyInertia<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.matrix + other.matrix)
    }
}

impl<T: RealField + Copy> std::ops::AddAssign for ArticulatedBodyInertia<T> {
    fn add_assign(&mut self, other: Self) {
        self.matrix += other.matrix;
    }
}
