//! Spatial vectors: six-component quantities with a rotational and a translational part.
//!
//! Notation follows the monogram convention used throughout the crate: `v_wb` is the spatial velocity of
//! body `B` measured in the world `W`, `p_pobo_w` is the position of the origin `Bo` relative to `Po`
//! expressed in `W`. Flattened to a [`Vector6`] the rotational part always comes first.

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use nalgebra::{RealField, Scalar, UnitQuaternion, Vector3, Vector6};

macro_rules! spatial_vector {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq)]
        pub struct $name<T: Scalar> {
            pub rotational: Vector3<T>,
            pub translational: Vector3<T>,
        }

        impl<T: RealField + Copy> $name<T> {
            pub fn new(rotational: Vector3<T>, translational: Vector3<T>) -> Self {
                Self {
                    rotational,
                    translational,
                }
            }

            pub fn zero() -> Self {
                Self::new(Vector3::zeros(), Vector3::zeros())
            }

            pub fn from_vector6(vector: &Vector6<T>) -> Self {
                Self::new(vector.fixed_rows::<3>(0).into_owned(), vector.fixed_rows::<3>(3).into_owned())
            }

            pub fn to_vector6(&self) -> Vector6<T> {
                let mut vector = Vector6::zeros();
                vector.fixed_rows_mut::<3>(0).copy_from(&self.rotational);
                vector.fixed_rows_mut::<3>(3).copy_from(&self.translational);
                vector
            }

            /// Expresses both parts in another frame given the rotation `R_EF` from the current frame `F`.
            pub fn re_express(&self, rotation: &UnitQuaternion<T>) -> Self {
                Self::new(
                    rotation.transform_vector(&self.rotational),
                    rotation.transform_vector(&self.translational),
                )
            }
        }

        impl<T: RealField + Copy> Add for $name<T> {
            type Output = Self;

            fn add(self, other: Self) -> Self {
                Self::new(self.rotational + other.rotational, self.translational + other.translational)
            }
        }

        impl<T: RealField + Copy> AddAssign for $name<T> {
            fn add_assign(&mut self, other: Self) {
                self.rotational += other.rotational;
                self.translational += other.translational;
            }
        }

        impl<T: RealField + Copy> Sub for $name<T> {
            type Output = Self;

            fn sub(self, other: Self) -> Self {
                Self::new(self.rotational - other.rotational, self.translational - other.translational)
            }
        }

        impl<T: RealField + Copy> SubAssign for $name<T> {
            fn sub_assign(&mut self, other: Self) {
                self.rotational -= other.rotational;
                self.translational -= other.translational;
            }
        }

        impl<T: RealField + Copy> Neg for $name<T> {
            type Output = Self;

            fn neg(self) -> Self {
                Self::new(-self.rotational, -self.translational)
            }
        }

        impl<T: RealField + Copy> Mul<T> for $name<T> {
            type Output = Self;

            fn mul(self, scale: T) -> Self {
                Self::new(self.rotational * scale, self.translational * scale)
            }
        }
    };
}

spatial_vector!(
    /// Angular velocity and the translational velocity of a point.
    SpatialVelocity
);
spatial_vector!(
    /// Angular acceleration and the translational acceleration of a point.
    SpatialAcceleration
);
spatial_vector!(
    /// Torque about a point and the force applied at that point.
    SpatialForce
);

impl<T: RealField + Copy> SpatialVelocity<T> {
    /// Velocity of a point `Q` rigidly attached to the moving frame, given `p_PoQ` in the same expressed-in
    /// frame.
    pub fn shift(&self, p_poq: &Vector3<T>) -> Self {
        Self::new(self.rotational, self.translational + self.rotational.cross(p_poq))
    }

    /// Composes `V_WP` (this) with the velocity `V_PB` of frame `B` measured in `P`, both expressed in the
    /// same frame, where `p_pobo` locates `Bo` from `Po`.
    pub fn compose_with_moving_frame_velocity(&self, p_pobo: &Vector3<T>, v_pb: &Self) -> Self {
        self.shift(p_pobo) + *v_pb
    }

    /// Power of a spatial force applied at the point this velocity is measured at.
    pub fn dot(&self, force: &SpatialForce<T>) -> T {
        self.rotational.dot(&force.rotational) + self.translational.dot(&force.translational)
    }
}

impl<T: RealField + Copy> SpatialAcceleration<T> {
    /// Acceleration of a point `Q` rigidly attached to the moving frame whose angular velocity is `w`.
    pub fn shift(&self, p_poq: &Vector3<T>, w: &Vector3<T>) -> Self {
        Self::new(
            self.rotational,
            self.translational + self.rotational.cross(p_poq) + w.cross(&w.cross(p_poq)),
        )
    }

    /// Composes `A_WP` (this) with the relative motion of frame `B` in `P`.
    ///
    /// `w_wp` is the angular velocity of `P` in `W`, `v_pb` and `a_pb` the velocity and acceleration of `B`
    /// measured in `P`. All quantities share the same expressed-in frame.
    pub fn compose_with_moving_frame_acceleration(
        &self,
        p_pobo: &Vector3<T>,
        w_wp: &Vector3<T>,
        v_pb: &SpatialVelocity<T>,
        a_pb: &Self,
    ) -> Self {
        let two = T::one() + T::one();
        let rotational = self.rotational + a_pb.rotational + w_wp.cross(&v_pb.rotational);
        let translational = self.translational
            + self.rotational.cross(p_pobo)
            + w_wp.cross(&w_wp.cross(p_pobo))
            + w_wp.cross(&v_pb.translational) * two
            + a_pb.translational;
        Self::new(rotational, translational)
    }
}

impl<T: RealField + Copy> SpatialForce<T> {
    /// The same force applied at `Q`, given `p_PoQ`. The torque picks up the moment arm.
    pub fn shift(&self, p_poq: &Vector3<T>) -> Self {
        Self::new(self.rotational - p_poq.cross(&self.translational), self.translational)
    }

    pub fn dot(&self, velocity: &SpatialVelocity<T>) -> T {
        velocity.dot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_velocity_shift_and_power_invariance() {
        let v = SpatialVelocity::new(Vector3::new(0.1, -0.4, 0.3), Vector3::new(1.0, 2.0, -0.5));
        let f = SpatialForce::new(Vector3::new(0.7, 0.2, -1.1), Vector3::new(-3.0, 0.5, 2.0));
        let p = Vector3::new(0.3, -1.2, 0.8);

        // Shifting both the velocity and the force to the same point keeps the power.
        assert_abs_diff_eq!(v.dot(&f), v.shift(&p).dot(&f.shift(&p)), epsilon = 1e-12);
        assert_abs_diff_eq!(v.shift(&p).shift(&-p).to_vector6(), v.to_vector6(), epsilon = 1e-12);
    }

    #[test]
    fn test_re_express_roundtrip() {
        let rotation = UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1);
        let a = SpatialAcceleration::new(Vector3::new(1.0, 0.0, 2.0), Vector3::new(0.0, -1.0, 0.5));
        let back = a.re_express(&rotation).re_express(&rotation.inverse());
        assert_abs_diff_eq!(back.to_vector6(), a.to_vector6(), epsilon = 1e-12);
    }

    #[test]
    fn test_compose_acceleration_of_rotating_point() {
        // A point fixed at radius r on a frame spinning at constant rate w has centripetal acceleration.
        let w = Vector3::new(0.0, 0.0, 2.0);
        let p = Vector3::new(0.5, 0.0, 0.0);
        let a_wp = SpatialAcceleration::zero();
        let a = a_wp.compose_with_moving_frame_acceleration(
            &p,
            &w,
            &SpatialVelocity::zero(),
            &SpatialAcceleration::zero(),
        );
        assert_abs_diff_eq!(a.translational, Vector3::new(-2.0, 0.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(a.to_vector6(), a_wp.shift(&p, &w).to_vector6(), epsilon = 1e-12);
    }

    #[test]
    fn test_vector6_layout() {
        let v = SpatialVelocity::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(v.to_vector6(), Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0));
        assert_eq!(SpatialVelocity::from_vector6(&v.to_vector6()), v);
        assert_eq!((v + v * 2.0 - v).to_vector6(), (v * 2.0).to_vector6());
        assert_eq!(-(-v), v);
    }
}
