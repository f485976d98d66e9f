//! Inverse dynamics and the quantities derived from it.

use nalgebra::{DMatrix, DVector, RealField};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::trace;
use tracing_attributes::instrument;

use super::{Internals, MultibodyTree};
use crate::cache::{ArticulatedBodyInertiaCache, HingeMatrixCache, PositionKinematicsCache, VelocityKinematicsCache};
use crate::context::MultibodyTreeContext;
use crate::errors::{check_dimension, Result};
use crate::force_element::MultibodyForces;
use crate::spatial::{SpatialAcceleration, SpatialForce};

impl<T: RealField + Copy> MultibodyTree<T> {
    /// Base-to-tip accelerations followed by the tip-to-base force pass, world included.
    #[allow(clippy::too_many_arguments)]
    fn inverse_dynamics(
        &self,
        internals: &Internals<T>,
        q: &[T],
        v: &[T],
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
        vdot: &[T],
        f_applied_bo_w: Option<&[SpatialForce<T>]>,
        tau_applied: Option<&[T]>,
        a_wb: &mut [SpatialAcceleration<T>],
        f_bbo_w: &mut [SpatialForce<T>],
        tau: &mut [T],
    ) {
        self.calc_spatial_accelerations(internals, q, v, pc, vc, vdot, a_wb);
        for level in self.topology.levels().iter().rev() {
            for &node in level {
                internals.body_nodes[node.0].calc_inverse_dynamics_tip_to_base(
                    self,
                    q,
                    pc,
                    vc,
                    a_wb,
                    f_applied_bo_w,
                    tau_applied,
                    f_bbo_w,
                    tau,
                );
            }
        }
    }

    /// Generalized forces `tau = M(q) vdot + C(q, v) - tau_applied - Σ J_Bᵀ F_Bo` for the state in
    /// `context`.
    pub fn calc_inverse_dynamics(
        &self,
        context: &MultibodyTreeContext<T>,
        known_vdot: &DVector<T>,
        external_forces: &MultibodyForces<T>,
    ) -> Result<DVector<T>> {
        self.internals("calc_inverse_dynamics")?;
        external_forces.check_has_right_size_for_model(self)?;
        let pc = self.eval_position_kinematics(context)?;
        let vc = self.eval_velocity_kinematics(context)?;
        let num_nodes = self.num_bodies();
        let mut a_wb = vec![SpatialAcceleration::zero(); num_nodes];
        let mut f_bbo_w = vec![SpatialForce::zero(); num_nodes];
        let mut tau = DVector::zeros(self.topology.num_velocities());
        self.calc_inverse_dynamics_with_caches(
            context,
            pc,
            vc,
            known_vdot.as_slice(),
            Some(external_forces.body_forces()),
            Some(external_forces.generalized_forces().as_slice()),
            &mut a_wb,
            &mut f_bbo_w,
            tau.as_mut_slice(),
        )?;
        Ok(tau)
    }

    /// Inverse dynamics against caller-provided caches and output buffers.
    ///
    /// Applied forces are optional and treated as zero when absent. On return `a_wb` holds the body
    /// accelerations and `f_bbo_w` the spatial force each inboard mobilizer exerts on its body at the body
    /// origin, both indexed by body node.
    #[allow(clippy::too_many_arguments)]
    pub fn calc_inverse_dynamics_with_caches(
        &self,
        context: &MultibodyTreeContext<T>,
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
        known_vdot: &[T],
        f_applied_bo_w: Option<&[SpatialForce<T>]>,
        tau_applied: Option<&[T]>,
        a_wb: &mut [SpatialAcceleration<T>],
        f_bbo_w: &mut [SpatialForce<T>],
        tau: &mut [T],
    ) -> Result<()> {
        let internals = self.internals("calc_inverse_dynamics")?;
        self.check_context(context)?;
        let (num_nodes, nv) = (internals.body_nodes.len(), self.topology.num_velocities());
        check_dimension("vdot", nv, known_vdot.len())?;
        check_dimension("position kinematics", num_nodes, pc.num_nodes())?;
        check_dimension("velocity kinematics", num_nodes, vc.num_nodes())?;
        check_dimension("spatial accelerations", num_nodes, a_wb.len())?;
        check_dimension("spatial forces", num_nodes, f_bbo_w.len())?;
        check_dimension("generalized forces", nv, tau.len())?;
        if let Some(applied) = f_applied_bo_w {
            check_dimension("applied spatial forces", num_nodes, applied.len())?;
        }
        if let Some(applied) = tau_applied {
            check_dimension("applied generalized forces", nv, applied.len())?;
        }
        self.inverse_dynamics(
            internals,
            context.positions(),
            context.velocities(),
            pc,
            vc,
            known_vdot,
            f_applied_bo_w,
            tau_applied,
            a_wb,
            f_bbo_w,
            tau,
        );
        Ok(())
    }

    /// Mass matrix assembled column by column: column `j` is the inverse dynamics for a unit `vdot_j`,
    /// zero velocities and no applied forces.
    #[instrument(level = "debug", skip_all)]
    pub fn calc_mass_matrix_via_inverse_dynamics(&self, context: &MultibodyTreeContext<T>) -> Result<DMatrix<T>> {
        let internals = self.internals("calc_mass_matrix_via_inverse_dynamics")?;
        let pc = self.eval_position_kinematics(context)?;
        let q = context.positions();
        let (num_nodes, nv) = (internals.body_nodes.len(), self.topology.num_velocities());
        if nv == 0 {
            return Ok(DMatrix::zeros(0, 0));
        }
        let vc = VelocityKinematicsCache::zero(num_nodes);
        let v = vec![T::zero(); nv];

        let column = |j: usize| {
            let mut vdot = vec![T::zero(); nv];
            vdot[j] = T::one();
            let mut a_wb = vec![SpatialAcceleration::zero(); num_nodes];
            let mut f_bbo_w = vec![SpatialForce::zero(); num_nodes];
            let mut tau = DVector::zeros(nv);
            self.inverse_dynamics(
                internals,
                q,
                &v,
                pc,
                &vc,
                &vdot,
                None,
                None,
                &mut a_wb,
                &mut f_bbo_w,
                tau.as_mut_slice(),
            );
            tau
        };

        #[cfg(feature = "rayon")]
        let columns: Vec<DVector<T>> = (0..nv).into_par_iter().map(column).collect();
        #[cfg(not(feature = "rayon"))]
        let columns: Vec<DVector<T>> = (0..nv).map(column).collect();

        trace!(nv, "assembled mass matrix");
        Ok(DMatrix::from_columns(&columns))
    }

    /// Coriolis, centripetal and gyroscopic terms `C(q, v)`: inverse dynamics with `vdot = 0`.
    pub fn calc_bias_term(&self, context: &MultibodyTreeContext<T>) -> Result<DVector<T>> {
        let internals = self.internals("calc_bias_term")?;
        let pc = self.eval_position_kinematics(context)?;
        let vc = self.eval_velocity_kinematics(context)?;
        let (num_nodes, nv) = (internals.body_nodes.len(), self.topology.num_velocities());
        let vdot = vec![T::zero(); nv];
        let mut a_wb = vec![SpatialAcceleration::zero(); num_nodes];
        let mut f_bbo_w = vec![SpatialForce::zero(); num_nodes];
        let mut tau = DVector::zeros(nv);
        self.inverse_dynamics(
            internals,
            context.positions(),
            context.velocities(),
            pc,
            vc,
            &vdot,
            None,
            None,
            &mut a_wb,
            &mut f_bbo_w,
            tau.as_mut_slice(),
        );
        Ok(tau)
    }

    /// Sums the contributions of all force elements and the joint damping into `forces`, which is
    /// zeroed first.
    pub fn calc_force_elements_contribution(
        &self,
        context: &MultibodyTreeContext<T>,
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
        forces: &mut MultibodyForces<T>,
    ) -> Result<()> {
        self.internals("calc_force_elements_contribution")?;
        self.check_context(context)?;
        forces.check_has_right_size_for_model(self)?;
        forces.set_zero();
        for element in &self.force_elements {
            element.calc_and_add_force_contribution(self, context, pc, vc, forces);
        }
        let v = context.velocities();
        for joint in &self.joints {
            joint.add_in_damping(v, forces.generalized_forces_mut().as_mut_slice());
        }
        Ok(())
    }

    /// Generalized forces of gravity, `tau_g = Σ J_Bᵀ F_gravity`. Zero without a gravity field.
    pub fn calc_gravity_generalized_forces(&self, context: &MultibodyTreeContext<T>) -> Result<DVector<T>> {
        let internals = self.internals("calc_gravity_generalized_forces")?;
        let (num_nodes, nv) = (internals.body_nodes.len(), self.topology.num_velocities());
        let pc = self.eval_position_kinematics(context)?;
        let Some(gravity) = self.gravity_field.map(|index| &self.force_elements[index.0]) else {
            return Ok(DVector::zeros(nv));
        };

        let vc = VelocityKinematicsCache::zero(num_nodes);
        let mut forces = MultibodyForces::new(self)?;
        gravity.calc_and_add_force_contribution(self, context, pc, &vc, &mut forces);

        // With v = 0 and vdot = 0 inverse dynamics reduces to -Σ J_Bᵀ F_Bo.
        let v = vec![T::zero(); nv];
        let mut a_wb = vec![SpatialAcceleration::zero(); num_nodes];
        let mut f_bbo_w = vec![SpatialForce::zero(); num_nodes];
        let mut tau = DVector::zeros(nv);
        self.inverse_dynamics(
            internals,
            context.positions(),
            &v,
            pc,
            &vc,
            &v,
            Some(forces.body_forces()),
            None,
            &mut a_wb,
            &mut f_bbo_w,
            tau.as_mut_slice(),
        );
        Ok(-tau)
    }

    /// Total potential energy stored in the force elements.
    pub fn calc_potential_energy(&self, context: &MultibodyTreeContext<T>) -> Result<T> {
        self.internals("calc_potential_energy")?;
        let pc = self.eval_position_kinematics(context)?;
        Ok(self
            .force_elements
            .iter()
            .fold(T::zero(), |energy, element| energy + element.calc_potential_energy(self, context, pc)))
    }

    /// Total power of the conservative forces of the force elements.
    pub fn calc_conservative_power(&self, context: &MultibodyTreeContext<T>) -> Result<T> {
        self.internals("calc_conservative_power")?;
        let pc = self.eval_position_kinematics(context)?;
        let vc = self.eval_velocity_kinematics(context)?;
        Ok(self.force_elements.iter().fold(T::zero(), |power, element| {
            power + element.calc_conservative_power(self, context, pc, vc)
        }))
    }

    /// Articulated-body inertias of every node, tip to base, memoized in `context`.
    pub fn eval_articulated_body_inertia<'c>(
        &self,
        context: &'c MultibodyTreeContext<T>,
    ) -> Result<&'c ArticulatedBodyInertiaCache<T>> {
        self.internals("eval_articulated_body_inertia")?;
        self.check_context(context)?;
        if let Some(cache) = context.articulated_body_inertia.get() {
            return Ok(cache);
        }
        let pc = self.eval_position_kinematics(context)?;
        let hc = self.eval_hinge_matrices(context)?;
        let cache = self.calc_articulated_body_inertia_cache(pc, hc)?;
        Ok(context.articulated_body_inertia.get_or_init(|| cache))
    }

    #[instrument(level = "trace", skip_all)]
    pub fn calc_articulated_body_inertia_cache(
        &self,
        pc: &PositionKinematicsCache<T>,
        hc: &HingeMatrixCache<T>,
    ) -> Result<ArticulatedBodyInertiaCache<T>> {
        let internals = self.internals("calc_articulated_body_inertia_cache")?;
        check_dimension("position kinematics", internals.body_nodes.len(), pc.num_nodes())?;
        check_dimension("hinge matrices", self.topology.num_velocities(), hc.matrix().ncols())?;
        let mut abic = ArticulatedBodyInertiaCache::new(internals.body_nodes.len());
        for level in self.topology.levels().iter().skip(1).rev() {
            for &node in level {
                internals.body_nodes[node.0].calc_articulated_body_inertia_tip_to_base(self, pc, hc, &mut abic)?;
            }
        }
        Ok(abic)
    }
}
