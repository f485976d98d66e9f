//! Per-state storage for the results of the body-node recursions.
//!
//! Every array is indexed by [`BodyNodeIndex`], not by body index. The caches are derived data: they are
//! valid for exactly one state snapshot and are recomputed whenever the owning context changes.

use nalgebra::{Dyn, Isometry3, Matrix6xX, MatrixView, RealField, Scalar, Vector3, U1, U6};

use crate::index::BodyNodeIndex;
use crate::inertia::ArticulatedBodyInertia;
use crate::spatial::{SpatialAcceleration, SpatialVelocity};
use crate::topology::BodyNodeTopology;

/// Poses produced by the position pass.
#[derive(Clone, Debug)]
pub struct PositionKinematicsCache<T: Scalar> {
    /// `X_WB`, pose of each body in the world.
    x_wb: Vec<Isometry3<T>>,
    /// `X_PB`, pose of each body in its parent body.
    x_pb: Vec<Isometry3<T>>,
    /// `X_FM`, across-mobilizer transforms.
    x_fm: Vec<Isometry3<T>>,
    /// `p_PoBo_W`, offset of each body origin from its parent origin, expressed in the world.
    p_pobo_w: Vec<Vector3<T>>,
}

impl<T: RealField + Copy> PositionKinematicsCache<T> {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            x_wb: vec![Isometry3::identity(); num_nodes],
            x_pb: vec![Isometry3::identity(); num_nodes],
            x_fm: vec![Isometry3::identity(); num_nodes],
            p_pobo_w: vec![Vector3::zeros(); num_nodes],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.x_wb.len()
    }

    pub fn x_wb(&self, node: BodyNodeIndex) -> &Isometry3<T> {
        &self.x_wb[node.0]
    }

    pub fn x_pb(&self, node: BodyNodeIndex) -> &Isometry3<T> {
        &self.x_pb[node.0]
    }

    pub fn x_fm(&self, node: BodyNodeIndex) -> &Isometry3<T> {
        &self.x_fm[node.0]
    }

    pub fn p_pobo_w(&self, node: BodyNodeIndex) -> &Vector3<T> {
        &self.p_pobo_w[node.0]
    }

    pub(crate) fn set(
        &mut self,
        node: BodyNodeIndex,
        x_fm: Isometry3<T>,
        x_pb: Isometry3<T>,
        x_wb: Isometry3<T>,
        p_pobo_w: Vector3<T>,
    ) {
        self.x_fm[node.0] = x_fm;
        self.x_pb[node.0] = x_pb;
        self.x_wb[node.0] = x_wb;
        self.p_pobo_w[node.0] = p_pobo_w;
    }
}

/// A read-only 6xk block of the hinge-matrix buffer.
pub type HingeMatrixView<'a, T> = MatrixView<'a, T, U6, Dyn, U1, U6>;

/// All hinge matrices `H_PB_W` in one 6 x nv buffer, the block of each node starting at its first
/// velocity.
#[derive(Clone, Debug, PartialEq)]
pub struct HingeMatrixCache<T: Scalar> {
    h_pb_w: Matrix6xX<T>,
}

impl<T: RealField + Copy> HingeMatrixCache<T> {
    pub fn new(num_velocities: usize) -> Self {
        Self {
            h_pb_w: Matrix6xX::zeros(num_velocities),
        }
    }

    /// The across-node Jacobian: column `i` is the spatial velocity of the body owning velocity `i`
    /// relative to its parent, per unit of that velocity.
    pub fn matrix(&self) -> &Matrix6xX<T> {
        &self.h_pb_w
    }

    pub fn block(&self, node: &BodyNodeTopology) -> HingeMatrixView<'_, T> {
        self.h_pb_w
            .columns(node.mobilizer_velocities_start, node.num_mobilizer_velocities)
    }

    pub(crate) fn matrix_mut(&mut self) -> &mut Matrix6xX<T> {
        &mut self.h_pb_w
    }
}

/// Spatial velocities produced by the velocity pass.
#[derive(Clone, Debug, PartialEq)]
pub struct VelocityKinematicsCache<T: Scalar> {
    /// `V_WB` at each body origin, expressed in the world.
    v_wb: Vec<SpatialVelocity<T>>,
    /// `V_PB_W`, velocity of each body relative to its parent at the body origin.
    v_pb_w: Vec<SpatialVelocity<T>>,
}

impl<T: RealField + Copy> VelocityKinematicsCache<T> {
    /// All velocities zero, which is the valid cache for a state at rest.
    pub fn zero(num_nodes: usize) -> Self {
        Self {
            v_wb: vec![SpatialVelocity::zero(); num_nodes],
            v_pb_w: vec![SpatialVelocity::zero(); num_nodes],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.v_wb.len()
    }

    pub fn v_wb(&self, node: BodyNodeIndex) -> &SpatialVelocity<T> {
        &self.v_wb[node.0]
    }

    pub fn v_pb_w(&self, node: BodyNodeIndex) -> &SpatialVelocity<T> {
        &self.v_pb_w[node.0]
    }

    pub(crate) fn set(&mut self, node: BodyNodeIndex, v_pb_w: SpatialVelocity<T>, v_wb: SpatialVelocity<T>) {
        self.v_pb_w[node.0] = v_pb_w;
        self.v_wb[node.0] = v_wb;
    }
}

/// Spatial accelerations `A_WB` at each body origin, expressed in the world.
#[derive(Clone, Debug, PartialEq)]
pub struct AccelerationKinematicsCache<T: Scalar> {
    a_wb: Vec<SpatialAcceleration<T>>,
}

impl<T: RealField + Copy> AccelerationKinematicsCache<T> {
    pub fn zero(num_nodes: usize) -> Self {
        Self {
            a_wb: vec![SpatialAcceleration::zero(); num_nodes],
        }
    }

    pub fn a_wb(&self, node: BodyNodeIndex) -> &SpatialAcceleration<T> {
        &self.a_wb[node.0]
    }

    pub fn as_slice(&self) -> &[SpatialAcceleration<T>] {
        &self.a_wb
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [SpatialAcceleration<T>] {
        &mut self.a_wb
    }
}

/// Articulated-body inertias produced by the tip-to-base inertia pass. The world entry stays zero.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticulatedBodyInertiaCache<T: Scalar> {
    /// `P_B_W`, articulated inertia of the sub-tree rooted at each body, about its origin.
    p_b_w: Vec<ArticulatedBodyInertia<T>>,
    /// `Pplus_PB_W`, the same inertia as felt across the body's mobilizer, still about the body origin.
    p_plus_pb_w: Vec<ArticulatedBodyInertia<T>>,
}

impl<T: RealField + Copy> ArticulatedBodyInertiaCache<T> {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            p_b_w: vec![ArticulatedBodyInertia::zero(); num_nodes],
            p_plus_pb_w: vec![ArticulatedBodyInertia::zero(); num_nodes],
        }
    }

    pub fn p_b_w(&self, node: BodyNodeIndex) -> &ArticulatedBodyInertia<T> {
        &self.p_b_w[node.0]
    }

    pub fn p_plus_pb_w(&self, node: BodyNodeIndex) -> &ArticulatedBodyInertia<T> {
        &self.p_plus_pb_w[node.0]
    }

    pub(crate) fn set(
        &mut self,
        node: BodyNodeIndex,
        p_b_w: ArticulatedBodyInertia<T>,
        p_plus_pb_w: ArticulatedBodyInertia<T>,
    ) {
        self.p_b_w[node.0] = p_b_w;
        self.p_plus_pb_w[node.0] = p_plus_pb_w;
    }
}
