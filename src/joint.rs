//! Joints: user-facing connections between two frames that expand into mobilizers at finalize time.

use std::fmt::Debug;
use std::ops::Range;

use nalgebra::{Isometry3, RealField, Vector3};

use crate::errors::Result;
use crate::index::{FrameIndex, JointIndex, MobilizerIndex, ModelInstanceIndex};
use crate::mobilizer::{Mobilizer, PrismaticMobilizer, QuaternionFloatingMobilizer, RevoluteMobilizer, WeldMobilizer};

/// Builds the mobilizers implementing a joint.
///
/// [`make_implementation_blueprint`](JointKind::make_implementation_blueprint) is called exactly once per
/// successful finalize. The reported position and velocity counts must equal the sums over the returned
/// mobilizers.
pub trait JointKind<T: RealField + Copy>: Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    fn num_positions(&self) -> usize;

    fn num_velocities(&self) -> usize;

    /// Viscous damping coefficient applied to every velocity of the joint.
    fn damping(&self) -> T {
        T::zero()
    }

    fn make_implementation_blueprint(
        &self,
        frame_on_parent: FrameIndex,
        frame_on_child: FrameIndex,
    ) -> Result<Vec<Box<dyn Mobilizer<T>>>>;
}

/// Where a finalized joint lives in the state vector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JointImplementation {
    pub mobilizers: Vec<MobilizerIndex>,
    pub positions: Vec<Range<usize>>,
    pub velocities: Vec<Range<usize>>,
}

#[derive(Debug)]
pub struct Joint<T: RealField + Copy> {
    index: JointIndex,
    name: String,
    model_instance: ModelInstanceIndex,
    frame_on_parent: FrameIndex,
    frame_on_child: FrameIndex,
    kind: Box<dyn JointKind<T>>,
    implementation: Option<JointImplementation>,
}

impl<T: RealField + Copy> Joint<T> {
    pub(crate) fn new(
        index: JointIndex,
        name: impl Into<String>,
        model_instance: ModelInstanceIndex,
        frame_on_parent: FrameIndex,
        frame_on_child: FrameIndex,
        kind: Box<dyn JointKind<T>>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            model_instance,
            frame_on_parent,
            frame_on_child,
            kind,
            implementation: None,
        }
    }

    pub fn index(&self) -> JointIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_instance(&self) -> ModelInstanceIndex {
        self.model_instance
    }

    pub fn frame_on_parent(&self) -> FrameIndex {
        self.frame_on_parent
    }

    pub fn frame_on_child(&self) -> FrameIndex {
        self.frame_on_child
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn num_positions(&self) -> usize {
        self.kind.num_positions()
    }

    pub fn num_velocities(&self) -> usize {
        self.kind.num_velocities()
    }

    pub fn damping(&self) -> T {
        self.kind.damping()
    }

    pub fn kind(&self) -> &dyn JointKind<T> {
        self.kind.as_ref()
    }

    /// `None` until the tree is finalized.
    pub fn implementation(&self) -> Option<&JointImplementation> {
        self.implementation.as_ref()
    }

    /// Indices of this joint's entries in the full position vector, empty before finalize.
    pub fn position_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.implementation.iter().flat_map(|i| i.positions.iter().cloned().flatten())
    }

    /// Indices of this joint's entries in the full velocity vector, empty before finalize.
    pub fn velocity_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.implementation.iter().flat_map(|i| i.velocities.iter().cloned().flatten())
    }

    /// Adds the damping torques `-d v` into `tau` for this joint's velocities.
    pub fn add_in_damping(&self, v: &[T], tau: &mut [T]) {
        let damping = self.damping();
        if damping == T::zero() {
            return;
        }
        for i in self.velocity_indices() {
            tau[i] -= damping * v[i];
        }
    }

    pub(crate) fn make_implementation_blueprint(&self) -> Result<Vec<Box<dyn Mobilizer<T>>>> {
        self.kind.make_implementation_blueprint(self.frame_on_parent, self.frame_on_child)
    }

    pub(crate) fn bind(&mut self, implementation: JointImplementation) {
        self.implementation = Some(implementation);
    }

    pub(crate) fn unbind(&mut self) {
        self.implementation = None;
    }
}

/// Rotation about an axis expressed in both the parent and the child frame.
#[derive(Clone, Debug)]
pub struct RevoluteJoint<T: RealField + Copy> {
    pub axis: Vector3<T>,
    pub damping: T,
}

impl<T: RealField + Copy> RevoluteJoint<T> {
    pub fn new(axis: Vector3<T>) -> Self {
        Self {
            axis,
            damping: T::zero(),
        }
    }

    pub fn with_damping(mut self, damping: T) -> Self {
        self.damping = damping;
        self
    }
}

impl<T: RealField + Copy> JointKind<T> for RevoluteJoint<T> {
    fn type_name(&self) -> &'static str {
        "revolute"
    }

    fn num_positions(&self) -> usize {
        1
    }

    fn num_velocities(&self) -> usize {
        1
    }

    fn damping(&self) -> T {
        self.damping
    }

    fn make_implementation_blueprint(
        &self,
        frame_on_parent: FrameIndex,
        frame_on_child: FrameIndex,
    ) -> Result<Vec<Box<dyn Mobilizer<T>>>> {
        Ok(vec![Box::new(RevoluteMobilizer::new(frame_on_parent, frame_on_child, self.axis)?)])
    }
}

/// Translation along an axis expressed in the parent frame.
#[derive(Clone, Debug)]
pub struct PrismaticJoint<T: RealField + Copy> {
    pub axis: Vector3<T>,
    pub damping: T,
}

impl<T: RealField + Copy> PrismaticJoint<T> {
    pub fn new(axis: Vector3<T>) -> Self {
        Self {
            axis,
            damping: T::zero(),
        }
    }

    pub fn with_damping(mut self, damping: T) -> Self {
        self.damping = damping;
        self
    }
}

impl<T: RealField + Copy> JointKind<T> for PrismaticJoint<T> {
    fn type_name(&self) -> &'static str {
        "prismatic"
    }

    fn num_positions(&self) -> usize {
        1
    }

    fn num_velocities(&self) -> usize {
        1
    }

    fn damping(&self) -> T {
        self.damping
    }

    fn make_implementation_blueprint(
        &self,
        frame_on_parent: FrameIndex,
        frame_on_child: FrameIndex,
    ) -> Result<Vec<Box<dyn Mobilizer<T>>>> {
        Ok(vec![Box::new(PrismaticMobilizer::new(frame_on_parent, frame_on_child, self.axis)?)])
    }
}

/// Fixes the child frame at `X_PC` in the parent frame.
#[derive(Clone, Debug)]
pub struct WeldJoint<T: RealField + Copy> {
    pub x_pc: Isometry3<T>,
}

impl<T: RealField + Copy> WeldJoint<T> {
    pub fn new(x_pc: Isometry3<T>) -> Self {
        Self { x_pc }
    }
}

impl<T: RealField + Copy> JointKind<T> for WeldJoint<T> {
    fn type_name(&self) -> &'static str {
        "weld"
    }

    fn num_positions(&self) -> usize {
        0
    }

    fn num_velocities(&self) -> usize {
        0
    }

    fn make_implementation_blueprint(
        &self,
        frame_on_parent: FrameIndex,
        frame_on_child: FrameIndex,
    ) -> Result<Vec<Box<dyn Mobilizer<T>>>> {
        Ok(vec![Box::new(WeldMobilizer::new(frame_on_parent, frame_on_child, self.x_pc))])
    }
}

/// Six degrees of freedom, orientation as a quaternion.
#[derive(Clone, Debug, Default)]
pub struct QuaternionFloatingJoint;

impl<T: RealField + Copy> JointKind<T> for QuaternionFloatingJoint {
    fn type_name(&self) -> &'static str {
        "quaternion_floating"
    }

    fn num_positions(&self) -> usize {
        7
    }

    fn num_velocities(&self) -> usize {
        6
    }

    fn make_implementation_blueprint(
        &self,
        frame_on_parent: FrameIndex,
        frame_on_child: FrameIndex,
    ) -> Result<Vec<Box<dyn Mobilizer<T>>>> {
        Ok(vec![Box::new(QuaternionFloatingMobilizer::new(frame_on_parent, frame_on_child))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damping_uses_bound_velocities() {
        let mut joint = Joint::new(
            JointIndex(0),
            "elbow",
            ModelInstanceIndex::DEFAULT,
            FrameIndex(1),
            FrameIndex(2),
            Box::new(RevoluteJoint::new(Vector3::z()).with_damping(0.5)),
        );
        let v = [1.0, 2.0, 3.0];
        let mut tau = [0.0; 3];

        // Unbound joints own no velocities.
        joint.add_in_damping(&v, &mut tau);
        assert_eq!(tau, [0.0; 3]);

        joint.bind(JointImplementation {
            mobilizers: vec![MobilizerIndex(1)],
            positions: vec![1..2],
            velocities: vec![1..2],
        });
        joint.add_in_damping(&v, &mut tau);
        assert_eq!(tau, [0.0, -1.0, 0.0]);
        assert_eq!(joint.position_indices().collect::<Vec<_>>(), vec![1]);
        assert_eq!(joint.make_implementation_blueprint().unwrap().len(), 1);
    }
}
