use crate::index::{ActuatorIndex, JointIndex, ModelInstanceIndex};

/// Applies a scalar generalized force to a single-dof joint.
///
/// Actuators are numbered in the order they are added; the index is the offset of the actuator's
/// value in the full actuation vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JointActuator {
    index: ActuatorIndex,
    name: String,
    joint: JointIndex,
    model_instance: ModelInstanceIndex,
}

impl JointActuator {
    pub(crate) fn new(
        index: ActuatorIndex,
        name: impl Into<String>,
        joint: JointIndex,
        model_instance: ModelInstanceIndex,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            joint,
            model_instance,
        }
    }

    pub fn index(&self) -> ActuatorIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joint(&self) -> JointIndex {
        self.joint
    }

    pub fn model_instance(&self) -> ModelInstanceIndex {
        self.model_instance
    }
}
