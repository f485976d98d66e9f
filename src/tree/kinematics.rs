//! Forward kinematics, frame queries, Jacobians and state mapping.

use std::ops::Range;

use nalgebra::{DMatrix, DVector, Isometry3, Matrix3xX, Matrix6xX, Point3, RealField, Vector3, Vector6};
use tracing_attributes::instrument;

use super::{Internals, MultibodyTree};
use crate::cache::{AccelerationKinematicsCache, HingeMatrixCache, PositionKinematicsCache, VelocityKinematicsCache};
use crate::context::MultibodyTreeContext;
use crate::errors::{check_dimension, Result, TreeError};
use crate::index::{BodyIndex, BodyNodeIndex, FrameIndex};
use crate::mobilizer::QuaternionFloatingMobilizer;
use crate::spatial::{SpatialAcceleration, SpatialVelocity};

impl<T: RealField + Copy> MultibodyTree<T> {
    /// A context at the zero configuration with zero velocities.
    pub fn create_default_context(&self) -> Result<MultibodyTreeContext<T>> {
        self.internals("create_default_context")?;
        let mut context = MultibodyTreeContext::new(
            self.id,
            self.topology.num_positions(),
            self.topology.num_velocities(),
        );
        self.set_default_context(&mut context)?;
        Ok(context)
    }

    pub fn set_default_context(&self, context: &mut MultibodyTreeContext<T>) -> Result<()> {
        self.internals("set_default_context")?;
        self.check_context(context)?;
        let q = context.positions_mut();
        for (mobilizer, topology) in self.mobilizers.iter().zip(self.topology.mobilizers()) {
            mobilizer.set_zero_configuration(&mut q[topology.positions()]);
        }
        context.velocities_mut().fill(T::zero());
        Ok(())
    }

    // Caches

    fn calc_position_kinematics_cache(&self, internals: &Internals<T>, q: &[T]) -> PositionKinematicsCache<T> {
        let mut pc = PositionKinematicsCache::new(internals.body_nodes.len());
        for level in self.topology.levels().iter().skip(1) {
            for &node in level {
                internals.body_nodes[node.0].calc_position_kinematics_base_to_tip(self, q, &mut pc);
            }
        }
        pc
    }

    fn calc_hinge_matrix_cache(
        &self,
        internals: &Internals<T>,
        q: &[T],
        pc: &PositionKinematicsCache<T>,
    ) -> HingeMatrixCache<T> {
        let mut hc = HingeMatrixCache::new(self.topology.num_velocities());
        for node in internals.body_nodes.iter().skip(1) {
            node.calc_across_node_geometric_jacobian_expressed_in_world(self, q, pc, &mut hc);
        }
        hc
    }

    pub(super) fn calc_velocity_kinematics_cache(
        &self,
        internals: &Internals<T>,
        pc: &PositionKinematicsCache<T>,
        hc: &HingeMatrixCache<T>,
        v: &[T],
    ) -> VelocityKinematicsCache<T> {
        let mut vc = VelocityKinematicsCache::zero(internals.body_nodes.len());
        for level in self.topology.levels().iter().skip(1) {
            for &node in level {
                internals.body_nodes[node.0].calc_velocity_kinematics_base_to_tip(pc, hc, v, &mut vc);
            }
        }
        vc
    }

    /// Poses of every body, memoized in `context`.
    pub fn eval_position_kinematics<'c>(
        &self,
        context: &'c MultibodyTreeContext<T>,
    ) -> Result<&'c PositionKinematicsCache<T>> {
        let internals = self.internals("eval_position_kinematics")?;
        self.check_context(context)?;
        Ok(context
            .position_kinematics
            .get_or_init(|| self.calc_position_kinematics_cache(internals, context.positions())))
    }

    /// Hinge matrices `H_PB_W` of every node, memoized in `context`.
    pub fn eval_hinge_matrices<'c>(&self, context: &'c MultibodyTreeContext<T>) -> Result<&'c HingeMatrixCache<T>> {
        let internals = self.internals("eval_hinge_matrices")?;
        let pc = self.eval_position_kinematics(context)?;
        Ok(context
            .hinge_matrices
            .get_or_init(|| self.calc_hinge_matrix_cache(internals, context.positions(), pc)))
    }

    /// Spatial velocities of every body, memoized in `context`.
    pub fn eval_velocity_kinematics<'c>(
        &self,
        context: &'c MultibodyTreeContext<T>,
    ) -> Result<&'c VelocityKinematicsCache<T>> {
        let internals = self.internals("eval_velocity_kinematics")?;
        let pc = self.eval_position_kinematics(context)?;
        let hc = self.eval_hinge_matrices(context)?;
        Ok(context
            .velocity_kinematics
            .get_or_init(|| self.calc_velocity_kinematics_cache(internals, pc, hc, context.velocities())))
    }

    /// The across-node Jacobian: all hinge matrices side by side, 6 x nv.
    pub fn calc_across_node_geometric_jacobian_expressed_in_world(
        &self,
        context: &MultibodyTreeContext<T>,
    ) -> Result<Matrix6xX<T>> {
        Ok(self.eval_hinge_matrices(context)?.matrix().clone())
    }

    // Poses and velocities

    fn body_node_index(&self, body: BodyIndex) -> Result<BodyNodeIndex> {
        Ok(self.topology.body(body)?.body_node)
    }

    /// `X_WB` for every body, indexed by [`BodyIndex`].
    pub fn calc_all_body_poses_in_world(&self, context: &MultibodyTreeContext<T>) -> Result<Vec<Isometry3<T>>> {
        let pc = self.eval_position_kinematics(context)?;
        Ok(self.topology.bodies().iter().map(|body| *pc.x_wb(body.body_node)).collect())
    }

    /// `V_WB` for every body, indexed by [`BodyIndex`].
    pub fn calc_all_body_spatial_velocities_in_world(
        &self,
        context: &MultibodyTreeContext<T>,
    ) -> Result<Vec<SpatialVelocity<T>>> {
        let vc = self.eval_velocity_kinematics(context)?;
        Ok(self.topology.bodies().iter().map(|body| *vc.v_wb(body.body_node)).collect())
    }

    pub fn eval_body_pose_in_world(&self, context: &MultibodyTreeContext<T>, body: BodyIndex) -> Result<Isometry3<T>> {
        let pc = self.eval_position_kinematics(context)?;
        Ok(*pc.x_wb(self.body_node_index(body)?))
    }

    pub fn eval_body_spatial_velocity_in_world(
        &self,
        context: &MultibodyTreeContext<T>,
        body: BodyIndex,
    ) -> Result<SpatialVelocity<T>> {
        let vc = self.eval_velocity_kinematics(context)?;
        Ok(*vc.v_wb(self.body_node_index(body)?))
    }

    /// `X_WF` for any frame.
    pub fn calc_frame_pose_in_world(&self, context: &MultibodyTreeContext<T>, frame: FrameIndex) -> Result<Isometry3<T>> {
        let frame = self.frame(frame)?;
        Ok(self.eval_body_pose_in_world(context, frame.body())? * frame.x_bf())
    }

    /// `X_AB`, the pose of `frame_b` in `frame_a`.
    pub fn calc_relative_transform(
        &self,
        context: &MultibodyTreeContext<T>,
        frame_a: FrameIndex,
        frame_b: FrameIndex,
    ) -> Result<Isometry3<T>> {
        let x_wa = self.calc_frame_pose_in_world(context, frame_a)?;
        let x_wb = self.calc_frame_pose_in_world(context, frame_b)?;
        Ok(x_wa.inv_mul(&x_wb))
    }

    /// Re-expresses points given in `frame_b` (one per column) in `frame_a`.
    pub fn calc_points_positions(
        &self,
        context: &MultibodyTreeContext<T>,
        frame_b: FrameIndex,
        p_bqi: &Matrix3xX<T>,
        frame_a: FrameIndex,
    ) -> Result<Matrix3xX<T>> {
        let x_ab = self.calc_relative_transform(context, frame_a, frame_b)?;
        let mut p_aqi = Matrix3xX::zeros(p_bqi.ncols());
        for (i, p_bq) in p_bqi.column_iter().enumerate() {
            let p_aq = x_ab * Point3::from(p_bq.clone_owned());
            p_aqi.set_column(i, &p_aq.coords);
        }
        Ok(p_aqi)
    }

    // Accelerations

    /// Runs the acceleration pass for the given positions and velocities; `a_wb` is indexed by node.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn calc_spatial_accelerations(
        &self,
        internals: &Internals<T>,
        q: &[T],
        v: &[T],
        pc: &PositionKinematicsCache<T>,
        vc: &VelocityKinematicsCache<T>,
        vdot: &[T],
        a_wb: &mut [SpatialAcceleration<T>],
    ) {
        a_wb[BodyNodeIndex::WORLD.0] = SpatialAcceleration::zero();
        for level in self.topology.levels().iter().skip(1) {
            for &node in level {
                internals.body_nodes[node.0].calc_spatial_acceleration_base_to_tip(self, q, v, pc, vc, vdot, a_wb);
            }
        }
    }

    /// Spatial accelerations `A_WB` of every body node for the generalized accelerations `vdot`.
    pub fn calc_acceleration_kinematics_cache(
        &self,
        context: &MultibodyTreeContext<T>,
        vdot: &DVector<T>,
    ) -> Result<AccelerationKinematicsCache<T>> {
        let internals = self.internals("calc_acceleration_kinematics_cache")?;
        check_dimension("vdot", self.topology.num_velocities(), vdot.len())?;
        let pc = self.eval_position_kinematics(context)?;
        let vc = self.eval_velocity_kinematics(context)?;
        let mut ac = AccelerationKinematicsCache::zero(internals.body_nodes.len());
        self.calc_spatial_accelerations(
            internals,
            context.positions(),
            context.velocities(),
            pc,
            vc,
            vdot.as_slice(),
            ac.as_mut_slice(),
        );
        Ok(ac)
    }

    /// `A_WB` for every body, indexed by [`BodyIndex`]. The world's entry is exactly zero.
    pub fn calc_spatial_accelerations_from_vdot(
        &self,
        context: &MultibodyTreeContext<T>,
        vdot: &DVector<T>,
    ) -> Result<Vec<SpatialAcceleration<T>>> {
        let ac = self.calc_acceleration_kinematics_cache(context, vdot)?;
        Ok(self.topology.bodies().iter().map(|body| *ac.a_wb(body.body_node)).collect())
    }

    // Jacobians

    /// Jacobian of the spatial velocity of a point `Q` fixed on the body of `node`, given `p_WQ`.
    ///
    /// Only the columns of the mobilizers between the body and the world are non-zero.
    fn calc_point_jacobian_on_path(
        &self,
        pc: &PositionKinematicsCache<T>,
        hc: &HingeMatrixCache<T>,
        node: BodyNodeIndex,
        p_wq: &Vector3<T>,
    ) -> Result<Matrix6xX<T>> {
        let mut jacobian = Matrix6xX::zeros(self.topology.num_velocities());
        for path_node in self.topology.kinematic_path_to_world(node)?.into_iter().skip(1) {
            let topology = self.topology.body_node(path_node)?;
            let p_boq_w = p_wq - pc.x_wb(path_node).translation.vector;
            for (k, h) in hc.block(topology).column_iter().enumerate() {
                let column = SpatialVelocity::from_vector6(&h.clone_owned()).shift(&p_boq_w);
                jacobian.set_column(topology.mobilizer_velocities_start + k, &column.to_vector6());
            }
        }
        Ok(jacobian)
    }

    /// Position `p_WQ` of a point given in `frame` and the node of the body it is fixed on.
    fn locate_point(
        &self,
        pc: &PositionKinematicsCache<T>,
        frame: FrameIndex,
        p_fq: &Vector3<T>,
    ) -> Result<(BodyNodeIndex, Vector3<T>)> {
        let frame = self.frame(frame)?;
        let node = self.body_node_index(frame.body())?;
        let p_wq = pc.x_wb(node) * (frame.x_bf() * Point3::from(*p_fq));
        Ok((node, p_wq.coords))
    }

    /// `J_WFq`, 6 x nv with the angular rows first, mapping `v` to the spatial velocity of the point `Q` of
    /// frame `F` at `p_FQ`, expressed in the world.
    #[instrument(level = "trace", skip_all)]
    pub fn calc_frame_geometric_jacobian_expressed_in_world(
        &self,
        context: &MultibodyTreeContext<T>,
        frame: FrameIndex,
        p_fq: &Vector3<T>,
    ) -> Result<Matrix6xX<T>> {
        self.internals("calc_frame_geometric_jacobian_expressed_in_world")?;
        let pc = self.eval_position_kinematics(context)?;
        let hc = self.eval_hinge_matrices(context)?;
        let (node, p_wq) = self.locate_point(pc, frame, p_fq)?;
        self.calc_point_jacobian_on_path(pc, hc, node, &p_wq)
    }

    /// Positions `p_WQi` and the stacked 3n x nv translational Jacobian of points given in `frame`.
    #[instrument(level = "trace", skip_all)]
    pub fn calc_points_geometric_jacobian_expressed_in_world(
        &self,
        context: &MultibodyTreeContext<T>,
        frame: FrameIndex,
        p_fqi: &Matrix3xX<T>,
    ) -> Result<(Matrix3xX<T>, DMatrix<T>)> {
        self.internals("calc_points_geometric_jacobian_expressed_in_world")?;
        let pc = self.eval_position_kinematics(context)?;
        let hc = self.eval_hinge_matrices(context)?;
        let nv = self.topology.num_velocities();
        let mut p_wqi = Matrix3xX::zeros(p_fqi.ncols());
        let mut jacobian = DMatrix::zeros(3 * p_fqi.ncols(), nv);
        for (i, p_fq) in p_fqi.column_iter().enumerate() {
            let (node, p_wq) = self.locate_point(pc, frame, &p_fq.clone_owned())?;
            let point_jacobian = self.calc_point_jacobian_on_path(pc, hc, node, &p_wq)?;
            jacobian
                .view_mut((3 * i, 0), (3, nv))
                .copy_from(&point_jacobian.fixed_rows::<3>(3));
            p_wqi.set_column(i, &p_wq);
        }
        Ok((p_wqi, jacobian))
    }

    /// `J̇ v` for the point `Q` of frame `F`: the spatial acceleration of `Q` when `vdot = 0`.
    pub fn calc_bias_for_frame_geometric_jacobian_expressed_in_world(
        &self,
        context: &MultibodyTreeContext<T>,
        frame: FrameIndex,
        p_fq: &Vector3<T>,
    ) -> Result<Vector6<T>> {
        self.internals("calc_bias_for_frame_geometric_jacobian_expressed_in_world")?;
        let bias = self.calc_point_bias_accelerations(context, frame, std::slice::from_ref(p_fq))?;
        Ok(bias[0].to_vector6())
    }

    /// Stacked translational parts of `J̇ v` for points given in `frame`, 3n entries.
    pub fn calc_bias_for_points_geometric_jacobian_expressed_in_world(
        &self,
        context: &MultibodyTreeContext<T>,
        frame: FrameIndex,
        p_fqi: &Matrix3xX<T>,
    ) -> Result<DVector<T>> {
        self.internals("calc_bias_for_points_geometric_jacobian_expressed_in_world")?;
        let points: Vec<Vector3<T>> = p_fqi.column_iter().map(|p| p.clone_owned()).collect();
        let bias = self.calc_point_bias_accelerations(context, frame, &points)?;
        let mut stacked = DVector::zeros(3 * bias.len());
        for (i, a_wq) in bias.iter().enumerate() {
            stacked.fixed_rows_mut::<3>(3 * i).copy_from(&a_wq.translational);
        }
        Ok(stacked)
    }

    fn calc_point_bias_accelerations(
        &self,
        context: &MultibodyTreeContext<T>,
        frame: FrameIndex,
        p_fqi: &[Vector3<T>],
    ) -> Result<Vec<SpatialAcceleration<T>>> {
        let pc = self.eval_position_kinematics(context)?;
        let vc = self.eval_velocity_kinematics(context)?;
        let ac = self.calc_acceleration_kinematics_cache(context, &DVector::zeros(self.topology.num_velocities()))?;
        p_fqi
            .iter()
            .map(|p_fq| {
                let (node, p_wq) = self.locate_point(pc, frame, p_fq)?;
                let p_boq_w = p_wq - pc.x_wb(node).translation.vector;
                Ok(ac.a_wb(node).shift(&p_boq_w, &vc.v_wb(node).rotational))
            })
            .collect()
    }

    // State mapping

    pub fn map_qdot_to_velocity(&self, context: &MultibodyTreeContext<T>, qdot: &DVector<T>) -> Result<DVector<T>> {
        self.internals("map_qdot_to_velocity")?;
        self.check_context(context)?;
        check_dimension("qdot", self.topology.num_positions(), qdot.len())?;
        let q = context.positions();
        let mut v = DVector::zeros(self.topology.num_velocities());
        for (mobilizer, topology) in self.mobilizers.iter().zip(self.topology.mobilizers()) {
            mobilizer.map_qdot_to_velocity(
                &q[topology.positions()],
                &qdot.as_slice()[topology.positions()],
                &mut v.as_mut_slice()[topology.velocities()],
            );
        }
        Ok(v)
    }

    pub fn map_velocity_to_qdot(&self, context: &MultibodyTreeContext<T>, v: &DVector<T>) -> Result<DVector<T>> {
        self.internals("map_velocity_to_qdot")?;
        self.check_context(context)?;
        check_dimension("velocities", self.topology.num_velocities(), v.len())?;
        let q = context.positions();
        let mut qdot = DVector::zeros(self.topology.num_positions());
        for (mobilizer, topology) in self.mobilizers.iter().zip(self.topology.mobilizers()) {
            mobilizer.map_velocity_to_qdot(
                &q[topology.positions()],
                &v.as_slice()[topology.velocities()],
                &mut qdot.as_mut_slice()[topology.positions()],
            );
        }
        Ok(qdot)
    }

    // Free bodies

    fn free_body_mobilizer(&self, body: BodyIndex) -> Result<(&QuaternionFloatingMobilizer<T>, Range<usize>, Range<usize>)> {
        let name = self.body(body)?.name();
        let not_free = || TreeError::NotFreeBody(name.to_string());
        let index = self.topology.body(body)?.inboard_mobilizer.ok_or_else(not_free)?;
        let mobilizer = self.mobilizers[index.0].as_quaternion_floating().ok_or_else(not_free)?;
        let topology = self.topology.mobilizer(index)?;
        Ok((mobilizer, topology.positions(), topology.velocities()))
    }

    /// The quaternion floating mobilizer connecting `body` to its parent.
    pub fn get_free_body_mobilizer(&self, body: BodyIndex) -> Result<&QuaternionFloatingMobilizer<T>> {
        self.internals("get_free_body_mobilizer")?;
        Ok(self.free_body_mobilizer(body)?.0)
    }

    /// Sets the pose `X_WB` of a free body, assuming its mobilizer's inboard frame is the world.
    pub fn set_free_body_pose(
        &self,
        context: &mut MultibodyTreeContext<T>,
        body: BodyIndex,
        x_wb: &Isometry3<T>,
    ) -> Result<()> {
        self.internals("set_free_body_pose")?;
        self.check_context(context)?;
        let (mobilizer, positions, _) = self.free_body_mobilizer(body)?;
        mobilizer.set_pose(&mut context.positions_mut()[positions], x_wb);
        Ok(())
    }

    pub fn set_free_body_spatial_velocity(
        &self,
        context: &mut MultibodyTreeContext<T>,
        body: BodyIndex,
        v_wb: &SpatialVelocity<T>,
    ) -> Result<()> {
        self.internals("set_free_body_spatial_velocity")?;
        self.check_context(context)?;
        let (mobilizer, _, velocities) = self.free_body_mobilizer(body)?;
        mobilizer.set_spatial_velocity(&mut context.velocities_mut()[velocities], v_wb);
        Ok(())
    }
}
