//! Bodies and the frames attached to them.

use nalgebra::{Isometry3, RealField};

use crate::index::{BodyIndex, BodyNodeIndex, FrameIndex, ModelInstanceIndex};
use crate::inertia::SpatialInertia;

/// A rigid body with its spatial inertia `M_BBo_B` about its origin, expressed in its own frame.
#[derive(Clone, Debug)]
pub struct Body<T: RealField + Copy> {
    index: BodyIndex,
    name: String,
    model_instance: ModelInstanceIndex,
    body_frame: FrameIndex,
    spatial_inertia: SpatialInertia<T>,
    node: Option<BodyNodeIndex>,
}

impl<T: RealField + Copy> Body<T> {
    pub(crate) fn new(
        index: BodyIndex,
        name: impl Into<String>,
        model_instance: ModelInstanceIndex,
        body_frame: FrameIndex,
        spatial_inertia: SpatialInertia<T>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            model_instance,
            body_frame,
            spatial_inertia,
            node: None,
        }
    }

    pub fn index(&self) -> BodyIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_instance(&self) -> ModelInstanceIndex {
        self.model_instance
    }

    pub fn body_frame(&self) -> FrameIndex {
        self.body_frame
    }

    pub fn spatial_inertia(&self) -> &SpatialInertia<T> {
        &self.spatial_inertia
    }

    pub fn is_world(&self) -> bool {
        self.index == BodyIndex::WORLD
    }

    /// The body node computing this body's kinematics. `None` until the tree is finalized.
    pub fn node_index(&self) -> Option<BodyNodeIndex> {
        self.node
    }

    pub(crate) fn bind(&mut self, node: BodyNodeIndex) {
        self.node = Some(node);
    }

    pub(crate) fn unbind(&mut self) {
        self.node = None;
    }
}

/// A frame rigidly attached to a body at the fixed pose `X_BF`.
#[derive(Clone, Debug)]
pub struct Frame<T: RealField + Copy> {
    index: FrameIndex,
    name: String,
    body: BodyIndex,
    model_instance: ModelInstanceIndex,
    x_bf: Isometry3<T>,
}

impl<T: RealField + Copy> Frame<T> {
    pub(crate) fn new(
        index: FrameIndex,
        name: impl Into<String>,
        body: BodyIndex,
        model_instance: ModelInstanceIndex,
        x_bf: Isometry3<T>,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            body,
            model_instance,
            x_bf,
        }
    }

    pub fn index(&self) -> FrameIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> BodyIndex {
        self.body
    }

    pub fn model_instance(&self) -> ModelInstanceIndex {
        self.model_instance
    }

    /// Pose of this frame in its body's frame.
    pub fn x_bf(&self) -> &Isometry3<T> {
        &self.x_bf
    }
}
