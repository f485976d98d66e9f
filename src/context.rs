//! The state container handed to every post-finalize query.

use std::cell::OnceCell;
use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::{DVector, RealField};

use crate::cache::{ArticulatedBodyInertiaCache, HingeMatrixCache, PositionKinematicsCache, VelocityKinematicsCache};
use crate::errors::{check_dimension, Result};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(0);

/// Identifies the tree a context was created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

impl TreeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The flat state `[q; v]` plus the kinematics caches evaluated for it.
///
/// Caches are filled lazily by the tree's `eval_*` methods and dropped by every mutation of the state:
/// a position change drops everything, a velocity change only the velocity kinematics.
#[derive(Clone, Debug)]
pub struct MultibodyTreeContext<T: RealField + Copy> {
    tree_id: TreeId,
    num_positions: usize,
    num_velocities: usize,
    state: DVector<T>,
    pub(crate) position_kinematics: OnceCell<PositionKinematicsCache<T>>,
    pub(crate) hinge_matrices: OnceCell<HingeMatrixCache<T>>,
    pub(crate) velocity_kinematics: OnceCell<VelocityKinematicsCache<T>>,
    pub(crate) articulated_body_inertia: OnceCell<ArticulatedBodyInertiaCache<T>>,
}

impl<T: RealField + Copy> MultibodyTreeContext<T> {
    pub(crate) fn new(tree_id: TreeId, num_positions: usize, num_velocities: usize) -> Self {
        Self {
            tree_id,
            num_positions,
            num_velocities,
            state: DVector::zeros(num_positions + num_velocities),
            position_kinematics: OnceCell::new(),
            hinge_matrices: OnceCell::new(),
            velocity_kinematics: OnceCell::new(),
            articulated_body_inertia: OnceCell::new(),
        }
    }

    pub fn tree_id(&self) -> TreeId {
        self.tree_id
    }

    pub fn num_positions(&self) -> usize {
        self.num_positions
    }

    pub fn num_velocities(&self) -> usize {
        self.num_velocities
    }

    pub fn state(&self) -> &DVector<T> {
        &self.state
    }

    pub fn positions(&self) -> &[T] {
        &self.state.as_slice()[..self.num_positions]
    }

    pub fn velocities(&self) -> &[T] {
        &self.state.as_slice()[self.num_positions..]
    }

    pub fn positions_mut(&mut self) -> &mut [T] {
        self.invalidate_positions();
        let nq = self.num_positions;
        &mut self.state.as_mut_slice()[..nq]
    }

    pub fn velocities_mut(&mut self) -> &mut [T] {
        self.invalidate_velocities();
        let nq = self.num_positions;
        &mut self.state.as_mut_slice()[nq..]
    }

    pub fn set_positions(&mut self, q: &[T]) -> Result<()> {
        check_dimension("positions", self.num_positions, q.len())?;
        self.positions_mut().copy_from_slice(q);
        Ok(())
    }

    pub fn set_velocities(&mut self, v: &[T]) -> Result<()> {
        check_dimension("velocities", self.num_velocities, v.len())?;
        self.velocities_mut().copy_from_slice(v);
        Ok(())
    }

    pub fn set_state(&mut self, state: &DVector<T>) -> Result<()> {
        check_dimension("state", self.state.len(), state.len())?;
        self.invalidate_positions();
        self.state.copy_from(state);
        Ok(())
    }

    /// Whether the position kinematics are currently memoized.
    pub fn has_position_kinematics(&self) -> bool {
        self.position_kinematics.get().is_some()
    }

    pub fn has_velocity_kinematics(&self) -> bool {
        self.velocity_kinematics.get().is_some()
    }

    fn invalidate_positions(&mut self) {
        self.position_kinematics.take();
        self.hinge_matrices.take();
        self.articulated_body_inertia.take();
        self.invalidate_velocities();
    }

    fn invalidate_velocities(&mut self) {
        self.velocity_kinematics.take();
    }
}
