//! The multibody tree: declaration of the model, the one-way finalize transition and the queries built
//! on the body-node recursions.
//!
//! A tree starts in the building phase where bodies, frames, mobilizers, joints, actuators and force
//! elements may be added. [`MultibodyTree::finalize`] compiles the topology and creates the body nodes;
//! afterwards the model is frozen and every kinematics or dynamics query becomes available.

mod dynamics;
mod kinematics;
mod selector;

use itertools::Itertools;
use nalgebra::{Isometry3, RealField, Vector3};
use tracing::{debug, trace};
use tracing_attributes::instrument;

use crate::actuator::JointActuator;
use crate::body::{Body, Frame};
use crate::body_node::BodyNode;
use crate::context::{MultibodyTreeContext, TreeId};
use crate::errors::{Result, TreeError};
use crate::force_element::{ForceElement, UniformGravityField};
use crate::index::{
    ActuatorIndex, BodyIndex, FrameIndex, ForceElementIndex, JointIndex, MobilizerIndex, ModelInstanceIndex,
};
use crate::inertia::SpatialInertia;
use crate::joint::{Joint, JointImplementation, JointKind};
use crate::mobilizer::{Mobilizer, QuaternionFloatingMobilizer};
use crate::model_instance::ModelInstance;
use crate::topology::Topology;

/// Name of the body with index 0.
pub const WORLD_BODY_NAME: &str = "WorldBody";
const WORLD_MODEL_INSTANCE_NAME: &str = "WorldModelInstance";
const DEFAULT_MODEL_INSTANCE_NAME: &str = "DefaultModelInstance";

/// Everything that only exists once the tree is finalized.
#[derive(Debug)]
struct Internals<T: RealField + Copy> {
    body_nodes: Vec<BodyNode<T>>,
    model_instances: Vec<ModelInstance>,
}

#[derive(Debug)]
enum Lifecycle<T: RealField + Copy> {
    Building,
    Finalized(Internals<T>),
}

/// A tree of rigid bodies connected by mobilizers and rooted at the world body.
#[derive(Debug)]
pub struct MultibodyTree<T: RealField + Copy> {
    id: TreeId,
    topology: Topology,
    pub(crate) bodies: Vec<Body<T>>,
    pub(crate) frames: Vec<Frame<T>>,
    pub(crate) mobilizers: Vec<Box<dyn Mobilizer<T>>>,
    mobilizer_model_instances: Vec<ModelInstanceIndex>,
    joints: Vec<Joint<T>>,
    actuators: Vec<JointActuator>,
    force_elements: Vec<Box<dyn ForceElement<T>>>,
    gravity_field: Option<ForceElementIndex>,
    model_instance_names: Vec<String>,
    lifecycle: Lifecycle<T>,
}

impl<T: RealField + Copy> Default for MultibodyTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RealField + Copy> MultibodyTree<T> {
    /// Creates a tree holding the world body, the world model instance (index 0) and the default model
    /// instance (index 1).
    pub fn new() -> Self {
        let topology = Topology::new();
        let world = Body::new(
            BodyIndex::WORLD,
            WORLD_BODY_NAME,
            ModelInstanceIndex::WORLD,
            FrameIndex::WORLD,
            SpatialInertia::zero(),
        );
        let world_frame = Frame::new(
            FrameIndex::WORLD,
            WORLD_BODY_NAME,
            BodyIndex::WORLD,
            ModelInstanceIndex::WORLD,
            Isometry3::identity(),
        );
        Self {
            id: TreeId::next(),
            topology,
            bodies: vec![world],
            frames: vec![world_frame],
            mobilizers: Vec::new(),
            mobilizer_model_instances: Vec::new(),
            joints: Vec::new(),
            actuators: Vec::new(),
            force_elements: Vec::new(),
            gravity_field: None,
            model_instance_names: vec![WORLD_MODEL_INSTANCE_NAME.into(), DEFAULT_MODEL_INSTANCE_NAME.into()],
            lifecycle: Lifecycle::Building,
        }
    }

    pub fn tree_id(&self) -> TreeId {
        self.id
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Finalized(_))
    }

    fn throw_if_finalized(&self, operation: &'static str) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Building => Ok(()),
            Lifecycle::Finalized(_) => Err(TreeError::AlreadyFinalized(operation)),
        }
    }

    fn internals(&self, operation: &'static str) -> Result<&Internals<T>> {
        match &self.lifecycle {
            Lifecycle::Building => Err(TreeError::NotFinalized(operation)),
            Lifecycle::Finalized(internals) => Ok(internals),
        }
    }

    /// Fails unless `context` was created by this tree for its current state size.
    pub(crate) fn check_context(&self, context: &MultibodyTreeContext<T>) -> Result<()> {
        if context.tree_id() != self.id
            || context.num_positions() != self.topology.num_positions()
            || context.num_velocities() != self.topology.num_velocities()
        {
            return Err(TreeError::IncompatibleContext);
        }
        Ok(())
    }

    fn check_model_instance(&self, instance: ModelInstanceIndex) -> Result<()> {
        if instance.0 < self.model_instance_names.len() {
            Ok(())
        } else {
            Err(TreeError::IndexOutOfBound {
                kind: "model instance",
                index: instance.0,
            })
        }
    }

    // Building

    pub fn add_model_instance(&mut self, name: impl Into<String>) -> Result<ModelInstanceIndex> {
        self.throw_if_finalized("add_model_instance")?;
        let name = name.into();
        if self.model_instance_names.contains(&name) {
            return Err(TreeError::NotUnique {
                kind: "model instance",
                name,
            });
        }
        self.model_instance_names.push(name);
        Ok(ModelInstanceIndex(self.model_instance_names.len() - 1))
    }

    /// Adds a body to the default model instance. `inertia` is `M_BBo_B`.
    pub fn add_rigid_body(&mut self, name: impl Into<String>, inertia: SpatialInertia<T>) -> Result<BodyIndex> {
        self.add_rigid_body_in_instance(name, ModelInstanceIndex::DEFAULT, inertia)
    }

    pub fn add_rigid_body_in_instance(
        &mut self,
        name: impl Into<String>,
        model_instance: ModelInstanceIndex,
        inertia: SpatialInertia<T>,
    ) -> Result<BodyIndex> {
        self.throw_if_finalized("add_rigid_body")?;
        self.check_model_instance(model_instance)?;
        let name = name.into();
        check_unique(
            "body",
            &name,
            model_instance,
            self.bodies.iter().map(|b| (b.name(), b.model_instance())),
        )?;
        let (index, body_frame) = self.topology.add_body()?;
        self.frames.push(Frame::new(body_frame, name.clone(), index, model_instance, Isometry3::identity()));
        self.bodies.push(Body::new(index, name, model_instance, body_frame, inertia));
        Ok(index)
    }

    /// Adds a frame fixed on `body` at `X_BF`.
    pub fn add_frame(&mut self, name: impl Into<String>, body: BodyIndex, x_bf: Isometry3<T>) -> Result<FrameIndex> {
        self.throw_if_finalized("add_frame")?;
        let model_instance = self.body(body)?.model_instance();
        let name = name.into();
        check_unique(
            "frame",
            &name,
            model_instance,
            self.frames.iter().map(|f| (f.name(), f.model_instance())),
        )?;
        let index = self.topology.add_frame(body)?;
        self.frames.push(Frame::new(index, name, body, model_instance, x_bf));
        Ok(index)
    }

    /// Adds a mobilizer directly, tagged with the model instance of its outboard body.
    pub fn add_mobilizer(&mut self, mobilizer: impl Mobilizer<T> + 'static) -> Result<MobilizerIndex> {
        self.throw_if_finalized("add_mobilizer")?;
        let outboard_body = self.frame(mobilizer.outboard_frame())?.body();
        let model_instance = self.bodies[outboard_body.0].model_instance();
        self.push_mobilizer(Box::new(mobilizer), model_instance)
    }

    fn push_mobilizer(
        &mut self,
        mobilizer: Box<dyn Mobilizer<T>>,
        model_instance: ModelInstanceIndex,
    ) -> Result<MobilizerIndex> {
        let index = self.topology.add_mobilizer(
            mobilizer.inboard_frame(),
            mobilizer.outboard_frame(),
            mobilizer.num_positions(),
            mobilizer.num_velocities(),
        )?;
        debug_assert_eq!(index.0, self.mobilizers.len());
        self.mobilizers.push(mobilizer);
        self.mobilizer_model_instances.push(model_instance);
        Ok(index)
    }

    /// Adds a joint tagged with the model instance of the child frame's body.
    pub fn add_joint(
        &mut self,
        name: impl Into<String>,
        frame_on_parent: FrameIndex,
        frame_on_child: FrameIndex,
        kind: impl JointKind<T> + 'static,
    ) -> Result<JointIndex> {
        let model_instance = self.frame(frame_on_child)?.model_instance();
        self.add_joint_in_instance(name, model_instance, frame_on_parent, frame_on_child, kind)
    }

    pub fn add_joint_in_instance(
        &mut self,
        name: impl Into<String>,
        model_instance: ModelInstanceIndex,
        frame_on_parent: FrameIndex,
        frame_on_child: FrameIndex,
        kind: impl JointKind<T> + 'static,
    ) -> Result<JointIndex> {
        self.throw_if_finalized("add_joint")?;
        self.check_model_instance(model_instance)?;
        self.frame(frame_on_parent)?;
        self.frame(frame_on_child)?;
        let name = name.into();
        check_unique(
            "joint",
            &name,
            model_instance,
            self.joints.iter().map(|j| (j.name(), j.model_instance())),
        )?;
        let index = JointIndex(self.joints.len());
        self.joints.push(Joint::new(
            index,
            name,
            model_instance,
            frame_on_parent,
            frame_on_child,
            Box::new(kind),
        ));
        Ok(index)
    }

    /// Actuates a single-dof joint. The actuator joins the joint's model instance.
    pub fn add_joint_actuator(&mut self, name: impl Into<String>, joint: JointIndex) -> Result<ActuatorIndex> {
        self.throw_if_finalized("add_joint_actuator")?;
        let joint = self.joint(joint)?;
        let name = name.into();
        if joint.num_velocities() != 1 {
            return Err(TreeError::ActuatedJointDofs {
                joint: joint.name().to_string(),
                dofs: joint.num_velocities(),
            });
        }
        if self.actuators.iter().any(|a| a.joint() == joint.index()) {
            return Err(TreeError::NotUnique {
                kind: "actuator on joint",
                name: joint.name().to_string(),
            });
        }
        check_unique(
            "actuator",
            &name,
            joint.model_instance(),
            self.actuators.iter().map(|a| (a.name(), a.model_instance())),
        )?;
        let index = ActuatorIndex(self.actuators.len());
        let actuator = JointActuator::new(index, name, joint.index(), joint.model_instance());
        self.actuators.push(actuator);
        Ok(index)
    }

    pub fn add_force_element(&mut self, element: impl ForceElement<T> + 'static) -> Result<ForceElementIndex> {
        self.throw_if_finalized("add_force_element")?;
        let index = ForceElementIndex(self.force_elements.len());
        if element.as_uniform_gravity_field().is_some() {
            if self.gravity_field.is_some() {
                return Err(TreeError::GravityFieldExists);
            }
            self.gravity_field = Some(index);
        }
        self.force_elements.push(Box::new(element));
        Ok(index)
    }

    pub fn add_uniform_gravity_field(&mut self, g_w: Vector3<T>) -> Result<ForceElementIndex> {
        self.add_force_element(UniformGravityField::new(g_w))
    }

    // Finalize

    /// Freezes the model: expands joints into mobilizers, gives every body without an inboard mobilizer a
    /// quaternion floating mobilizer to the world, compiles the topology and creates the body nodes.
    ///
    /// On failure the tree stays in the building phase with all mobilizers added by this call removed.
    #[instrument(level = "debug", skip_all, fields(tree = ?self.id))]
    pub fn finalize(&mut self) -> Result<()> {
        self.throw_if_finalized("finalize")?;
        let num_declared_mobilizers = self.mobilizers.len();
        match self.try_finalize() {
            Ok(internals) => {
                self.lifecycle = Lifecycle::Finalized(internals);
                debug!(
                    bodies = self.num_bodies(),
                    mobilizers = self.num_mobilizers(),
                    positions = self.topology.num_positions(),
                    velocities = self.topology.num_velocities(),
                    height = self.topology.tree_height(),
                    "finalized multibody tree"
                );
                Ok(())
            }
            Err(error) => {
                debug!(%error, "finalize failed, rolling back");
                self.rollback(num_declared_mobilizers);
                Err(error)
            }
        }
    }

    fn try_finalize(&mut self) -> Result<Internals<T>> {
        // Both steps add mobilizers and must precede the topology compilation.
        self.create_joint_implementations()?;
        self.add_quaternion_floating_mobilizers_to_free_bodies()?;
        self.topology.finalize()?;
        self.bind_elements_to_topology()?;
        let body_nodes = self.create_body_nodes()?;
        let model_instances = self.create_model_instances(&body_nodes)?;
        Ok(Internals {
            body_nodes,
            model_instances,
        })
    }

    fn create_joint_implementations(&mut self) -> Result<()> {
        for j in 0..self.joints.len() {
            let blueprint = self.joints[j].make_implementation_blueprint()?;
            let joint = &self.joints[j];
            if blueprint.is_empty() {
                return Err(TreeError::EmptyJointImplementation(joint.name().to_string()));
            }
            let num_positions = blueprint.iter().map(|m| m.num_positions()).sum();
            let num_velocities = blueprint.iter().map(|m| m.num_velocities()).sum();
            crate::errors::check_dimension("joint positions", joint.num_positions(), num_positions)?;
            crate::errors::check_dimension("joint velocities", joint.num_velocities(), num_velocities)?;

            let model_instance = joint.model_instance();
            debug!(joint = joint.name(), kind = joint.type_name(), "expanding joint");
            let mobilizers = blueprint
                .into_iter()
                .map(|mobilizer| self.push_mobilizer(mobilizer, model_instance))
                .collect::<Result<Vec<_>>>()?;
            self.joints[j].bind(JointImplementation {
                mobilizers,
                ..Default::default()
            });
        }
        Ok(())
    }

    fn add_quaternion_floating_mobilizers_to_free_bodies(&mut self) -> Result<()> {
        for body in self.topology.bodies_without_inboard_mobilizer() {
            let body = &self.bodies[body.0];
            let (body_frame, model_instance) = (body.body_frame(), body.model_instance());
            debug!(body = body.name(), "adding quaternion floating mobilizer");
            let mobilizer = QuaternionFloatingMobilizer::new(FrameIndex::WORLD, body_frame);
            self.push_mobilizer(Box::new(mobilizer), model_instance)?;
        }
        Ok(())
    }

    fn bind_elements_to_topology(&mut self) -> Result<()> {
        for body in &mut self.bodies {
            body.bind(self.topology.body(body.index())?.body_node);
        }
        for joint in &mut self.joints {
            let Some(implementation) = joint.implementation() else {
                continue;
            };
            let mut bound = implementation.clone();
            for &mobilizer in &implementation.mobilizers {
                let mobilizer = self.topology.mobilizer(mobilizer)?;
                bound.positions.push(mobilizer.positions());
                bound.velocities.push(mobilizer.velocities());
            }
            joint.bind(bound);
        }
        Ok(())
    }

    fn create_body_nodes(&self) -> Result<Vec<BodyNode<T>>> {
        let mut body_nodes: Vec<BodyNode<T>> = Vec::with_capacity(self.topology.num_body_nodes());
        for (level, nodes) in self.topology.levels().iter().enumerate() {
            for &index in nodes {
                let topology = self.topology.body_node(index)?.clone();
                debug_assert_eq!(index.0, body_nodes.len());
                debug_assert_eq!(topology.level, level);

                let (x_pf, x_mb) = match topology.mobilizer {
                    Some(mobilizer) => {
                        let mobilizer = self.topology.mobilizer(mobilizer)?;
                        (
                            *self.frames[mobilizer.inboard_frame.0].x_bf(),
                            self.frames[mobilizer.outboard_frame.0].x_bf().inverse(),
                        )
                    }
                    None => (Isometry3::identity(), Isometry3::identity()),
                };
                let parent = topology.parent_body_node;
                trace!(node = %index, body = %topology.body, level, "creating body node");
                body_nodes.push(BodyNode::new(topology, x_pf, x_mb));
                if let Some(parent) = parent {
                    body_nodes[parent.0].add_child_node(index);
                }
            }
        }
        Ok(body_nodes)
    }

    fn create_model_instances(&self, body_nodes: &[BodyNode<T>]) -> Result<Vec<ModelInstance>> {
        let mut instances = self
            .model_instance_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                ModelInstance::new(
                    ModelInstanceIndex(i),
                    name.clone(),
                    self.topology.num_positions(),
                    self.topology.num_velocities(),
                    self.actuators.len(),
                )
            })
            .collect_vec();
        for node in body_nodes {
            let Some(mobilizer) = node.topology().mobilizer else {
                continue;
            };
            let topology = self.topology.mobilizer(mobilizer)?;
            let instance = self.mobilizer_model_instances[mobilizer.0];
            instances[instance.0].add_mobilizer(mobilizer, topology.positions(), topology.velocities());
        }
        for actuator in &self.actuators {
            instances[actuator.model_instance().0].add_actuator(actuator.index());
        }
        Ok(instances)
    }

    fn rollback(&mut self, num_declared_mobilizers: usize) {
        self.mobilizers.truncate(num_declared_mobilizers);
        self.mobilizer_model_instances.truncate(num_declared_mobilizers);
        self.topology.truncate_mobilizers(num_declared_mobilizers);
        self.joints.iter_mut().for_each(Joint::unbind);
        self.bodies.iter_mut().for_each(Body::unbind);
    }

    // Element access

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_mobilizers(&self) -> usize {
        self.mobilizers.len()
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn num_actuators(&self) -> usize {
        self.actuators.len()
    }

    /// Every actuator drives one velocity, so this equals the number of actuators.
    pub fn num_actuated_dofs(&self) -> usize {
        self.actuators.len()
    }

    pub fn num_force_elements(&self) -> usize {
        self.force_elements.len()
    }

    pub fn num_model_instances(&self) -> usize {
        self.model_instance_names.len()
    }

    pub fn num_positions(&self) -> Result<usize> {
        self.internals("num_positions")?;
        Ok(self.topology.num_positions())
    }

    pub fn num_velocities(&self) -> Result<usize> {
        self.internals("num_velocities")?;
        Ok(self.topology.num_velocities())
    }

    pub fn num_states(&self) -> Result<usize> {
        Ok(self.num_positions()? + self.num_velocities()?)
    }

    pub fn tree_height(&self) -> Result<usize> {
        self.internals("tree_height")?;
        Ok(self.topology.tree_height())
    }

    pub fn bodies(&self) -> &[Body<T>] {
        &self.bodies
    }

    pub fn frames(&self) -> &[Frame<T>] {
        &self.frames
    }

    pub fn joints(&self) -> &[Joint<T>] {
        &self.joints
    }

    pub fn actuators(&self) -> &[JointActuator] {
        &self.actuators
    }

    pub fn world_body(&self) -> &Body<T> {
        &self.bodies[BodyIndex::WORLD.0]
    }

    pub fn body(&self, index: BodyIndex) -> Result<&Body<T>> {
        self.bodies.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "body",
            index: index.0,
        })
    }

    pub fn frame(&self, index: FrameIndex) -> Result<&Frame<T>> {
        self.frames.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "frame",
            index: index.0,
        })
    }

    pub fn mobilizer(&self, index: MobilizerIndex) -> Result<&dyn Mobilizer<T>> {
        self.mobilizers
            .get(index.0)
            .map(|m| m.as_ref())
            .ok_or(TreeError::IndexOutOfBound {
                kind: "mobilizer",
                index: index.0,
            })
    }

    pub fn joint(&self, index: JointIndex) -> Result<&Joint<T>> {
        self.joints.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "joint",
            index: index.0,
        })
    }

    pub fn actuator(&self, index: ActuatorIndex) -> Result<&JointActuator> {
        self.actuators.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "actuator",
            index: index.0,
        })
    }

    pub fn force_element(&self, index: ForceElementIndex) -> Result<&dyn ForceElement<T>> {
        self.force_elements
            .get(index.0)
            .map(|f| f.as_ref())
            .ok_or(TreeError::IndexOutOfBound {
                kind: "force element",
                index: index.0,
            })
    }

    pub fn gravity_field(&self) -> Option<&UniformGravityField<T>> {
        self.gravity_field
            .and_then(|index| self.force_elements[index.0].as_uniform_gravity_field())
    }

    pub fn get_body_by_name(&self, name: &str) -> Result<&Body<T>> {
        find_unique("body", name, self.bodies.iter().filter(|b| b.name() == name))
    }

    pub fn get_frame_by_name(&self, name: &str) -> Result<&Frame<T>> {
        find_unique("frame", name, self.frames.iter().filter(|f| f.name() == name))
    }

    pub fn get_joint_by_name(&self, name: &str) -> Result<&Joint<T>> {
        find_unique("joint", name, self.joints.iter().filter(|j| j.name() == name))
    }

    pub fn get_actuator_by_name(&self, name: &str) -> Result<&JointActuator> {
        find_unique("actuator", name, self.actuators.iter().filter(|a| a.name() == name))
    }

    pub fn get_model_instance_by_name(&self, name: &str) -> Result<ModelInstanceIndex> {
        self.model_instance_names
            .iter()
            .position(|n| n == name)
            .map(ModelInstanceIndex)
            .ok_or_else(|| TreeError::UnknownName {
                kind: "model instance",
                name: name.to_string(),
            })
    }

    pub fn model_instance_name(&self, index: ModelInstanceIndex) -> Result<&str> {
        self.check_model_instance(index)?;
        Ok(&self.model_instance_names[index.0])
    }

    pub fn model_instance(&self, index: ModelInstanceIndex) -> Result<&ModelInstance> {
        let internals = self.internals("model_instance")?;
        internals.model_instances.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "model instance",
            index: index.0,
        })
    }

    /// Body nodes in breadth-first order, the world node first.
    pub fn body_nodes(&self) -> Result<&[BodyNode<T>]> {
        Ok(&self.internals("body_nodes")?.body_nodes)
    }
}

fn check_unique<'a>(
    kind: &'static str,
    name: &str,
    model_instance: ModelInstanceIndex,
    mut existing: impl Iterator<Item = (&'a str, ModelInstanceIndex)>,
) -> Result<()> {
    if existing.any(|(n, instance)| n == name && instance == model_instance) {
        Err(TreeError::NotUnique {
            kind,
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn find_unique<'a, E>(kind: &'static str, name: &str, mut matches: impl Iterator<Item = &'a E>) -> Result<&'a E> {
    match (matches.next(), matches.next()) {
        (Some(element), None) => Ok(element),
        (None, _) => Err(TreeError::UnknownName {
            kind,
            name: name.to_string(),
        }),
        (Some(_), Some(_)) => Err(TreeError::NotUnique {
            kind,
            name: name.to_string(),
        }),
    }
}
