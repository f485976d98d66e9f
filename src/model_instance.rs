//! Named partitions of the state and actuation vectors.

use std::ops::Range;

use itertools::Itertools;
use nalgebra::{DVector, Scalar};

use crate::errors::{check_dimension, Result};
use crate::index::{ActuatorIndex, MobilizerIndex, ModelInstanceIndex};

/// The mobilizers and actuators tagged with one model instance, in body-node order.
///
/// Built at finalize time. Sub-vectors concatenate the instance's mobilizer slices in the order the
/// tree visits them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelInstance {
    index: ModelInstanceIndex,
    name: String,
    mobilizers: Vec<MobilizerIndex>,
    positions: Vec<Range<usize>>,
    velocities: Vec<Range<usize>>,
    actuators: Vec<ActuatorIndex>,
    tree_num_positions: usize,
    tree_num_velocities: usize,
    tree_num_actuators: usize,
}

impl ModelInstance {
    pub(crate) fn new(
        index: ModelInstanceIndex,
        name: impl Into<String>,
        tree_num_positions: usize,
        tree_num_velocities: usize,
        tree_num_actuators: usize,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            tree_num_positions,
            tree_num_velocities,
            tree_num_actuators,
            ..Default::default()
        }
    }

    pub(crate) fn add_mobilizer(&mut self, mobilizer: MobilizerIndex, positions: Range<usize>, velocities: Range<usize>) {
        self.mobilizers.push(mobilizer);
        self.positions.push(positions);
        self.velocities.push(velocities);
    }

    pub(crate) fn add_actuator(&mut self, actuator: ActuatorIndex) {
        self.actuators.push(actuator);
    }

    pub fn index(&self) -> ModelInstanceIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mobilizers(&self) -> &[MobilizerIndex] {
        &self.mobilizers
    }

    pub fn actuators(&self) -> &[ActuatorIndex] {
        &self.actuators
    }

    pub fn num_positions(&self) -> usize {
        self.positions.iter().map(|range| range.len()).sum()
    }

    pub fn num_velocities(&self) -> usize {
        self.velocities.iter().map(|range| range.len()).sum()
    }

    /// Every actuator drives a single velocity.
    pub fn num_actuated_dofs(&self) -> usize {
        self.actuators.len()
    }

    fn position_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions.iter().cloned().flatten()
    }

    fn velocity_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.velocities.iter().cloned().flatten()
    }

    pub fn get_positions_from_array<T: Scalar + Copy>(&self, q: &DVector<T>) -> Result<DVector<T>> {
        check_dimension("positions", self.tree_num_positions, q.len())?;
        Ok(gather(self.position_indices(), q))
    }

    pub fn set_positions_in_array<T: Scalar + Copy>(&self, q_instance: &DVector<T>, q: &mut DVector<T>) -> Result<()> {
        check_dimension("positions", self.tree_num_positions, q.len())?;
        check_dimension("instance positions", self.num_positions(), q_instance.len())?;
        scatter(self.position_indices(), q_instance, q);
        Ok(())
    }

    pub fn get_velocities_from_array<T: Scalar + Copy>(&self, v: &DVector<T>) -> Result<DVector<T>> {
        check_dimension("velocities", self.tree_num_velocities, v.len())?;
        Ok(gather(self.velocity_indices(), v))
    }

    pub fn set_velocities_in_array<T: Scalar + Copy>(
        &self,
        v_instance: &DVector<T>,
        v: &mut DVector<T>,
    ) -> Result<()> {
        check_dimension("velocities", self.tree_num_velocities, v.len())?;
        check_dimension("instance velocities", self.num_velocities(), v_instance.len())?;
        scatter(self.velocity_indices(), v_instance, v);
        Ok(())
    }

    pub fn get_actuation_from_array<T: Scalar + Copy>(&self, u: &DVector<T>) -> Result<DVector<T>> {
        check_dimension("actuation", self.tree_num_actuators, u.len())?;
        Ok(gather(self.actuators.iter().map(|a| a.0), u))
    }

    /// Writes this instance's actuation values into the full actuation vector `u`.
    pub fn set_actuation_vector<T: Scalar + Copy>(&self, u_instance: &DVector<T>, u: &mut DVector<T>) -> Result<()> {
        check_dimension("actuation", self.tree_num_actuators, u.len())?;
        check_dimension("instance actuation", self.num_actuated_dofs(), u_instance.len())?;
        scatter(self.actuators.iter().map(|a| a.0), u_instance, u);
        Ok(())
    }
}

fn gather<T: Scalar + Copy>(indices: impl Iterator<Item = usize>, full: &DVector<T>) -> DVector<T> {
    DVector::from_vec(indices.map(|i| full[i]).collect_vec())
}

fn scatter<T: Scalar + Copy>(indices: impl Iterator<Item = usize>, part: &DVector<T>, full: &mut DVector<T>) {
    for (i, value) in indices.zip(part.iter()) {
        full[i] = *value;
    }
}
