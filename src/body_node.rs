//! Body nodes: the per-body computational units of the finalized tree.
//!
//! A node observes its body, its inboard mobilizer and its children through indices; the tree owns all of
//! them. Base-to-tip passes read the parent's entry of a cache, tip-to-base passes read the children's.
//! For a node `B` with parent `P` the mobilizer connects frame `F` (fixed in `P`) to frame `M` (fixed in
//! `B`).

use nalgebra::{Isometry3, RealField, UnitQuaternion, Vector3, Vector6};

use crate::cache::{
    ArticulatedBodyInertiaCache, HingeMatrixCache, PositionKinematicsCache, VelocityKinematicsCache,
};
use crate::errors::{Result, TreeError};
use crate::index::{BodyIndex, BodyNodeIndex};
use crate::inertia::ArticulatedBodyInertia;
use crate::mobilizer::Mobilizer;
use crate::spatial::{SpatialAcceleration, SpatialForce, SpatialVelocity};
use crate::topology::BodyNodeTopology;
use crate::tree::MultibodyTree;

#[derive(Clone, Debug)]
pub struct BodyNode<T: RealField + Copy> {
    topology: BodyNodeTopology,
    children: Vec<BodyNodeIndex>,
    /// `X_PF`, pose of the inboard frame in the parent body.
    x_pf: Isometry3<T>,
    /// `X_MB`, pose of the body in the outboard frame.
    x_mb: Isometry3<T>,
}

impl<T: RealField + Copy> BodyNode<T> {
    pub(crate) fn new(topology: BodyNodeTopology, x_pf: Isometry3<T>, x_mb: Isometry3<T>) -> Self {
        Self {
            topology,
            children: Vec::new(),
            x_pf,
            x_mb,
        }
    }

    pub(crate) fn add_child_node(&mut self, child: BodyNodeIndex) {
        self.children.push(child);
    }

    pub fn index(&self) -> BodyNodeIndex {
        self.topology.index
    }

    pub fn level(&self) -> usize {
        self.topology.level
    }

    pub fn body(&self) -> BodyIndex {
        self.topology.body
    }

    pub fn parent(&self) -> Option<BodyNodeIndex> {
        self.topology.parent_body_node
    }

    pub fn children(&self) -> &[BodyNodeIndex] {
        &self.children
    }

    pub fn topology(&self) -> &BodyNodeTopology {
        &self.topology
    }

    fn mobilizer<'a>(&self, tree: &'a MultibodyTree<T>) -> Option<&'a dyn Mobilizer<T>> {
        self.topology.mobilizer.map(|m| tree.mobilizers[m.0].as_ref())
    }

    /// `R_WF` from the parent's pose in the world.
    fn r_wf(&self, pc: &PositionKinematicsCache<T>, parent: BodyNodeIndex) -> UnitQuaternion<T> {
        pc.x_wb(parent).rotation * self.x_pf.rotation
    }

    /// `p_MoBo_F`, the body origin seen from the outboard frame origin, expressed in `F`.
    fn p_mobo_f(&self, pc: &PositionKinematicsCache<T>) -> Vector3<T> {
        pc.x_fm(self.index()).rotation * self.x_mb.translation.vector
    }

    /// Computes `X_FM`, `X_PB`, `X_WB` and `p_PoBo_W` from the parent's pose. The world entry stays identity.
    pub(crate) fn calc_position_kinematics_base_to_tip(
        &self,
        tree: &MultibodyTree<T>,
        q: &[T],
        pc: &mut PositionKinematicsCache<T>,
    ) {
        let (Some(mobilizer), Some(parent)) = (self.mobilizer(tree), self.parent()) else {
            return;
        };
        let x_fm = mobilizer.calc_across_mobilizer_transform(&q[self.topology.positions()]);
        let x_pb = self.x_pf * x_fm * self.x_mb;
        let x_wp = *pc.x_wb(parent);
        let p_pobo_w = x_wp.rotation * x_pb.translation.vector;
        pc.set(self.index(), x_fm, x_pb, x_wp * x_pb, p_pobo_w);
    }

    /// Writes this node's block of `H_PB_W`: the mobilizer's `H_FM` re-expressed in the world and shifted
    /// from `Mo` to `Bo`.
    pub(crate) fn calc_across_node_geometric_jacobian_expressed_in_world(
        &self,
        tree: &MultibodyTree<T>,
        q: &[T],
        pc: &PositionKinematicsCache<T>,
        hc: &mut HingeMatrixCache<T>,
    ) {
        let (Some(mobilizer), Some(parent)) = (self.mobilizer(tree), self.parent()) else {
            return;
        };
        let nv = self.topology.num_mobilizer_velocities;
        if nv == 0 {
            return;
        }
        let r_wf = self.r_wf(pc, parent);
        let p_mobo_w = r_wf * self.p_mobo_f(pc);

        let mut block = hc
            .matrix_mut()
            .columns_mut(self.topology.mobilizer_velocities_start, nv);
        mobilizer.calc_hinge_matrix(&q[self.topology.positions()], &mut block);
        for mut column in block.column_iter_mut() {
            let h_fm: Vector6<T> = column.clone_owned();
            let h_pb_w = SpatialVelocity::from_vector6(&h_fm).re_express(&r_wf).shift(&p_mobo_w);
            column.copy_from(&h_pb_w.to_vector6());
        }
    }

    /// `V_WB = V_WP` shifted to `Bo` plus `H_PB_W v_B`.
    pub(crate) fn calc_velocity_kinematics_base_to_tip(
        &self,
        pc: &PositionKinematicsCache<T>,
        hc: &HingeMatrixCache<T>,
        v: &[T],
        vc: &mut VelocityKinematicsCache<T>,
    ) {
        let Some(parent) = self.parent() else {
            return;
        };
        let h = hc.block(&self.topology);
        let mut v_pb = Vector6::zeros();
        for (column, vk) in h.column_iter().zip(&v[self.topology.velocities()]) {
            v_pb += column * *vk;
        }
        let v_pb_w = SpatialVelocity::from_vector6(&v_pb);
        let v_wb = vc
            .v_wb(parent)
            .compose_with_moving_frame_velocity(pc.p_pobo_w(self.index()), &v_pb_w);
        vc.set(self.index(), v_pb_w, v_wb);
    }

    /// `A_WB` from the parent's acceleration, the mobilizer's `A_FM` for `vdot` and the velocity products.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn calc_spatial_acceleration_base_to_tip(
        &self,
        tree: &MultibodyTree<T>,
        q: &[T],
        v: &[T],
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
        vdot: &[T],
        a_wb: &mut [SpatialAcceleration<T>],
    ) {
        let index = self.index();
        let (Some(mobilizer), Some(parent)) = (self.mobilizer(tree), self.parent()) else {
            a_wb[index.0] = SpatialAcceleration::zero();
            return;
        };
        let (positions, velocities) = (self.topology.positions(), self.topology.velocities());
        let q_local = &q[positions];
        let v_local = &v[velocities.clone()];
        let v_fm = mobilizer.calc_across_mobilizer_spatial_velocity(q_local, v_local);
        let a_fm = mobilizer.calc_across_mobilizer_spatial_acceleration(q_local, v_local, &vdot[velocities]);

        // Bo is fixed in M, so its acceleration in F picks up the centripetal term of w_FM.
        let a_pb_w = a_fm
            .shift(&self.p_mobo_f(pc), &v_fm.rotational)
            .re_express(&self.r_wf(pc, parent));
        let a_wp = a_wb[parent.0];
        a_wb[index.0] = a_wp.compose_with_moving_frame_acceleration(
            pc.p_pobo_w(index),
            &vc.v_wb(parent).rotational,
            vc.v_pb_w(index),
            &a_pb_w,
        );
    }

    /// Accumulates `F_BBo_W`, the spatial force the inboard mobilizer exerts on `B` at `Bo`, and projects it
    /// onto the mobilizer's generalized forces.
    ///
    /// The children's entries of `f_bbo_w` must be computed already. The world node computes its total but
    /// projects nothing.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn calc_inverse_dynamics_tip_to_base(
        &self,
        tree: &MultibodyTree<T>,
        q: &[T],
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
        a_wb: &[SpatialAcceleration<T>],
        f_applied_bo_w: Option<&[SpatialForce<T>]>,
        tau_applied: Option<&[T]>,
        f_bbo_w: &mut [SpatialForce<T>],
        tau: &mut [T],
    ) {
        let index = self.index();
        let body = &tree.bodies[self.topology.body.0];
        let m_bo_w = body.spatial_inertia().re_express(&pc.x_wb(index).rotation);

        let mut f_bo_w =
            m_bo_w.mul_acceleration(&a_wb[index.0]) + m_bo_w.dynamic_bias(&vc.v_wb(index).rotational);
        if let Some(applied) = f_applied_bo_w {
            f_bo_w -= applied[index.0];
        }
        for &child in &self.children {
            f_bo_w += f_bbo_w[child.0].shift(&-pc.p_pobo_w(child));
        }
        f_bbo_w[index.0] = f_bo_w;

        let (Some(mobilizer), Some(parent)) = (self.mobilizer(tree), self.parent()) else {
            return;
        };
        let r_wf = self.r_wf(pc, parent);
        let p_mobo_w = r_wf * self.p_mobo_f(pc);
        let f_bmo_f = f_bo_w.shift(&-p_mobo_w).re_express(&r_wf.inverse());

        let velocities = self.topology.velocities();
        mobilizer.project_spatial_force(&q[self.topology.positions()], &f_bmo_f, &mut tau[velocities.clone()]);
        if let Some(tau_applied) = tau_applied {
            for i in velocities {
                tau[i] -= tau_applied[i];
            }
        }
    }

    /// Computes `P_B_W` from the body inertia and the children's `Pplus`, then projects out the mobilizer's
    /// motion subspace: `Pplus_PB_W = P - U D⁻¹ Uᵀ` with `U = P H` and `D = Hᵀ P H`.
    pub(crate) fn calc_articulated_body_inertia_tip_to_base(
        &self,
        tree: &MultibodyTree<T>,
        pc: &PositionKinematicsCache<T>,
        hc: &HingeMatrixCache<T>,
        abic: &mut ArticulatedBodyInertiaCache<T>,
    ) -> Result<()> {
        let index = self.index();
        if self.parent().is_none() {
            return Ok(());
        }
        let body = &tree.bodies[self.topology.body.0];
        let m_b_w = body.spatial_inertia().re_express(&pc.x_wb(index).rotation);

        let mut p_b_w = ArticulatedBodyInertia::from(m_b_w);
        for &child in &self.children {
            p_b_w += abic.p_plus_pb_w(child).shift(&-pc.p_pobo_w(child));
        }

        let p_plus_pb_w = if self.topology.num_mobilizer_velocities == 0 {
            p_b_w
        } else {
            let h = hc.block(&self.topology);
            let u = p_b_w.matrix() * h;
            let d = h.transpose() * &u;
            let cholesky = d
                .cholesky()
                .ok_or(TreeError::SingularArticulatedInertia(body.index()))?;
            let d_inv_ut = cholesky.solve(&u.transpose());
            ArticulatedBodyInertia::new(p_b_w.matrix() - &u * d_inv_ut)
        };
        abic.set(index, p_b_w, p_plus_pb_w);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

    use crate::index::FrameIndex;
    use crate::inertia::SpatialInertia;
    use crate::joint::RevoluteJoint;
    use crate::tree::MultibodyTree;

    #[test]
    fn test_children_register_in_breadth_first_order() {
        let mut tree = MultibodyTree::<f64>::new();
        let inertia = SpatialInertia::solid_sphere(1.0, 0.1);
        let a = tree.add_rigid_body("a", inertia).unwrap();
        let b = tree.add_rigid_body("b", inertia).unwrap();
        let c = tree.add_rigid_body("c", inertia).unwrap();
        let fa = tree.body(a).unwrap().body_frame();
        let fb = tree.body(b).unwrap().body_frame();
        let fc = tree.body(c).unwrap().body_frame();
        let offset = Isometry3::from_parts(Translation3::new(0.0, 0.0, 1.0), UnitQuaternion::identity());
        let fa_tip = tree.add_frame("a_tip", a, offset).unwrap();
        tree.add_joint("ja", FrameIndex::WORLD, fa, RevoluteJoint::new(Vector3::x())).unwrap();
        tree.add_joint("jb", fa_tip, fb, RevoluteJoint::new(Vector3::y())).unwrap();
        tree.add_joint("jc", fa_tip, fc, RevoluteJoint::new(Vector3::z())).unwrap();
        tree.finalize().unwrap();

        let nodes = tree.body_nodes().unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].children().len(), 1);
        assert_eq!(nodes[1].children().len(), 2);
        for node in nodes {
            assert_eq!(node.children(), node.topology().child_nodes.as_slice());
            if let Some(parent) = node.parent() {
                assert!(nodes[parent.0].level() + 1 == node.level());
            }
        }
        assert_abs_diff_eq!(nodes[2].x_pf.translation.vector, Vector3::new(0.0, 0.0, 1.0));
    }
}
