//! Selector matrices and per-instance slicing of the state and actuation vectors.

use itertools::Itertools;
use nalgebra::{DMatrix, DVector, RealField};

use super::MultibodyTree;
use crate::errors::{Result, TreeError};
use crate::index::{ActuatorIndex, JointIndex, ModelInstanceIndex};

impl<T: RealField + Copy> MultibodyTree<T> {
    /// `Sx` such that `x_selected = Sx x`, with `x = [q; v]`.
    ///
    /// The selected state lists the positions of every joint in the given order, then their velocities.
    pub fn make_state_selector_matrix(&self, joints: &[JointIndex]) -> Result<DMatrix<f64>> {
        self.internals("make_state_selector_matrix")?;
        if let Some(repeated) = joints.iter().duplicates().next() {
            return Err(TreeError::RepeatedJoint(self.joint(*repeated)?.name().to_string()));
        }
        let joints = joints.iter().map(|&j| self.joint(j)).collect::<Result<Vec<_>>>()?;
        let nq = self.topology.num_positions();
        let columns = joints
            .iter()
            .flat_map(|joint| joint.position_indices())
            .chain(joints.iter().flat_map(|joint| joint.velocity_indices().map(|i| nq + i)))
            .collect_vec();

        let mut selector = DMatrix::zeros(columns.len(), nq + self.topology.num_velocities());
        for (row, column) in columns.into_iter().enumerate() {
            selector[(row, column)] = 1.0;
        }
        Ok(selector)
    }

    pub fn make_state_selector_matrix_from_joint_names(&self, names: &[&str]) -> Result<DMatrix<f64>> {
        let joints = names
            .iter()
            .map(|name| self.get_joint_by_name(name).map(|joint| joint.index()))
            .collect::<Result<Vec<_>>>()?;
        self.make_state_selector_matrix(&joints)
    }

    /// `Su` such that `u = Su u_selected`, i.e. an `nu × n` matrix for `n` selected actuators.
    pub fn make_actuator_selector_matrix(&self, actuators: &[ActuatorIndex]) -> Result<DMatrix<f64>> {
        self.internals("make_actuator_selector_matrix")?;
        if let Some(repeated) = actuators.iter().duplicates().next() {
            return Err(TreeError::RepeatedActuator(self.actuator(*repeated)?.name().to_string()));
        }
        let mut selector = DMatrix::zeros(self.num_actuated_dofs(), actuators.len());
        for (column, &actuator) in actuators.iter().enumerate() {
            selector[(self.actuator(actuator)?.index().0, column)] = 1.0;
        }
        Ok(selector)
    }

    /// Same as [`make_actuator_selector_matrix`](Self::make_actuator_selector_matrix) for the actuators
    /// driving `joints`. Every joint must be actuated.
    pub fn make_actuator_selector_matrix_for_joints(&self, joints: &[JointIndex]) -> Result<DMatrix<f64>> {
        self.internals("make_actuator_selector_matrix_for_joints")?;
        if let Some(repeated) = joints.iter().duplicates().next() {
            return Err(TreeError::RepeatedJoint(self.joint(*repeated)?.name().to_string()));
        }
        let actuators = joints
            .iter()
            .map(|&j| {
                let joint = self.joint(j)?;
                self.actuators
                    .iter()
                    .find(|actuator| actuator.joint() == j)
                    .map(|actuator| actuator.index())
                    .ok_or_else(|| TreeError::UnactuatedJoint(joint.name().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.make_actuator_selector_matrix(&actuators)
    }

    pub fn get_positions_from_array(&self, instance: ModelInstanceIndex, q: &DVector<T>) -> Result<DVector<T>> {
        self.model_instance(instance)?.get_positions_from_array(q)
    }

    pub fn set_positions_in_array(
        &self,
        instance: ModelInstanceIndex,
        q_instance: &DVector<T>,
        q: &mut DVector<T>,
    ) -> Result<()> {
        self.model_instance(instance)?.set_positions_in_array(q_instance, q)
    }

    pub fn get_velocities_from_array(&self, instance: ModelInstanceIndex, v: &DVector<T>) -> Result<DVector<T>> {
        self.model_instance(instance)?.get_velocities_from_array(v)
    }

    pub fn set_velocities_in_array(
        &self,
        instance: ModelInstanceIndex,
        v_instance: &DVector<T>,
        v: &mut DVector<T>,
    ) -> Result<()> {
        self.model_instance(instance)?.set_velocities_in_array(v_instance, v)
    }

    pub fn get_actuation_from_array(&self, instance: ModelInstanceIndex, u: &DVector<T>) -> Result<DVector<T>> {
        self.model_instance(instance)?.get_actuation_from_array(u)
    }

    pub fn set_actuation_vector(
        &self,
        instance: ModelInstanceIndex,
        u_instance: &DVector<T>,
        u: &mut DVector<T>,
    ) -> Result<()> {
        self.model_instance(instance)?.set_actuation_vector(u_instance, u)
    }
}
