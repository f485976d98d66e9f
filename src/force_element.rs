//! Applied forces and the force elements producing them.

use std::fmt::Debug;

use nalgebra::{DVector, Point3, RealField, Scalar, Vector3};

use crate::cache::{PositionKinematicsCache, VelocityKinematicsCache};
use crate::context::MultibodyTreeContext;
use crate::errors::{check_dimension, Result, TreeError};
use crate::index::{BodyIndex, BodyNodeIndex, ModelInstanceIndex};
use crate::spatial::SpatialForce;
use crate::tree::MultibodyTree;

/// Spatial forces applied on each body, at its origin and expressed in the world, plus generalized
/// forces applied directly on the velocities.
#[derive(Clone, Debug, PartialEq)]
pub struct MultibodyForces<T: Scalar> {
    f_bo_w: Vec<SpatialForce<T>>,
    tau: DVector<T>,
}

impl<T: RealField + Copy> MultibodyForces<T> {
    pub fn zeros(num_bodies: usize, num_velocities: usize) -> Self {
        Self {
            f_bo_w: vec![SpatialForce::zero(); num_bodies],
            tau: DVector::zeros(num_velocities),
        }
    }

    /// Zero forces sized for a finalized tree.
    pub fn new(tree: &MultibodyTree<T>) -> Result<Self> {
        Ok(Self::zeros(tree.num_bodies(), tree.num_velocities()?))
    }

    pub fn set_zero(&mut self) {
        self.f_bo_w.fill(SpatialForce::zero());
        self.tau.fill(T::zero());
    }

    pub fn num_bodies(&self) -> usize {
        self.f_bo_w.len()
    }

    /// Indexed by [`BodyNodeIndex`].
    pub fn body_forces(&self) -> &[SpatialForce<T>] {
        &self.f_bo_w
    }

    pub fn body_forces_mut(&mut self) -> &mut [SpatialForce<T>] {
        &mut self.f_bo_w
    }

    pub fn add_in_body_force(&mut self, node: BodyNodeIndex, force: SpatialForce<T>) {
        self.f_bo_w[node.0] += force;
    }

    /// Adds `force`, applied at the origin of `body` and expressed in the world, looking up the body node
    /// of `body` in `tree`.
    pub fn add_in_body_force_on(
        &mut self,
        tree: &MultibodyTree<T>,
        body: BodyIndex,
        force: SpatialForce<T>,
    ) -> Result<()> {
        let node = tree
            .body(body)?
            .node_index()
            .ok_or(TreeError::NotFinalized("add_in_body_force_on"))?;
        check_dimension("body forces", tree.num_bodies(), self.f_bo_w.len())?;
        self.add_in_body_force(node, force);
        Ok(())
    }

    pub fn generalized_forces(&self) -> &DVector<T> {
        &self.tau
    }

    pub fn generalized_forces_mut(&mut self) -> &mut DVector<T> {
        &mut self.tau
    }

    pub fn add_in_place(&mut self, other: &Self) -> Result<()> {
        check_dimension("body forces", self.f_bo_w.len(), other.f_bo_w.len())?;
        check_dimension("generalized forces", self.tau.len(), other.tau.len())?;
        for (mine, theirs) in self.f_bo_w.iter_mut().zip(&other.f_bo_w) {
            *mine += *theirs;
        }
        self.tau += &other.tau;
        Ok(())
    }

    pub fn check_has_right_size_for_model(&self, tree: &MultibodyTree<T>) -> Result<()> {
        check_dimension("body forces", tree.num_bodies(), self.f_bo_w.len())?;
        check_dimension("generalized forces", tree.num_velocities()?, self.tau.len())
    }
}

/// A source of applied forces, potential energy and conservative power.
///
/// Contributions are summed over all force elements of a tree; each element adds into the forces it
/// is handed and never overwrites them.
pub trait ForceElement<T: RealField + Copy>: Debug + Send + Sync {
    fn model_instance(&self) -> ModelInstanceIndex {
        ModelInstanceIndex::DEFAULT
    }

    fn calc_and_add_force_contribution(
        &self,
        tree: &MultibodyTree<T>,
        context: &MultibodyTreeContext<T>,
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
        forces: &mut MultibodyForces<T>,
    );

    fn calc_potential_energy(
        &self,
        tree: &MultibodyTree<T>,
        context: &MultibodyTreeContext<T>,
        pc: &PositionKinematicsCache<T>,
    ) -> T;

    /// Rate of work of the conservative forces, i.e. minus the rate of change of the potential energy.
    fn calc_conservative_power(
        &self,
        tree: &MultibodyTree<T>,
        context: &MultibodyTreeContext<T>,
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
    ) -> T;

    fn as_uniform_gravity_field(&self) -> Option<&UniformGravityField<T>> {
        None
    }
}

/// Constant acceleration of gravity acting on every body's center of mass.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformGravityField<T: Scalar> {
    g_w: Vector3<T>,
}

impl<T: RealField + Copy> UniformGravityField<T> {
    pub fn new(g_w: Vector3<T>) -> Self {
        Self { g_w }
    }

    /// Standard gravity along the world's negative z axis.
    pub fn standard() -> Self {
        Self::new(Vector3::new(T::zero(), T::zero(), nalgebra::convert(-9.81)))
    }

    pub fn gravity_vector(&self) -> &Vector3<T> {
        &self.g_w
    }
}

impl<T: RealField + Copy> ForceElement<T> for UniformGravityField<T> {
    fn calc_and_add_force_contribution(
        &self,
        tree: &MultibodyTree<T>,
        _context: &MultibodyTreeContext<T>,
        pc: &PositionKinematicsCache<T>,
        _vc: &VelocityKinematicsCache<T>,
        forces: &mut MultibodyForces<T>,
    ) {
        for body in tree.bodies().iter().skip(1) {
            let Some(node) = body.node_index() else { continue };
            let inertia = body.spatial_inertia();
            let p_bobcm_w = pc.x_wb(node).rotation * inertia.com();
            let f = self.g_w * inertia.mass();
            forces.add_in_body_force(node, SpatialForce::new(p_bobcm_w.cross(&f), f));
        }
    }

    fn calc_potential_energy(
        &self,
        tree: &MultibodyTree<T>,
        _context: &MultibodyTreeContext<T>,
        pc: &PositionKinematicsCache<T>,
    ) -> T {
        let mut energy = T::zero();
        for body in tree.bodies().iter().skip(1) {
            let Some(node) = body.node_index() else { continue };
            let inertia = body.spatial_inertia();
            let p_wbcm = pc.x_wb(node) * Point3::from(*inertia.com());
            energy -= self.g_w.dot(&p_wbcm.coords) * inertia.mass();
        }
        energy
    }

    fn calc_conservative_power(
        &self,
        tree: &MultibodyTree<T>,
        _context: &MultibodyTreeContext<T>,
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
    ) -> T {
        let mut power = T::zero();
        for body in tree.bodies().iter().skip(1) {
            let Some(node) = body.node_index() else { continue };
            let inertia = body.spatial_inertia();
            let p_bobcm_w = pc.x_wb(node).rotation * inertia.com();
            let v_wbcm = vc.v_wb(node).shift(&p_bobcm_w).translational;
            power += self.g_w.dot(&v_wbcm) * inertia.mass();
        }
        power
    }

    fn as_uniform_gravity_field(&self) -> Option<&UniformGravityField<T>> {
        Some(self)
    }
}
