//! ## About
//!
//! Kinematics and dynamics of articulated rigid-body mechanisms organized as a tree of bodies rooted
//! at the world. Bodies are connected by mobilizers (the tree edges carrying the generalized
//! coordinates); joints are the user-facing connections that expand into mobilizers.
//!
//! A [`MultibodyTree`] is declared in a building phase, then frozen by [`MultibodyTree::finalize`].
//! All state lives in a [`MultibodyTreeContext`], which also memoizes the kinematics caches. See
//! [`MultibodyTree`] to get started.
//!
//! ## Reading list
//!
//! * [Rigid Body Dynamics Algorithms](https://doi.org/10.1007/978-1-4899-7560-7), Featherstone
//! * [A Spatial Operator Algebra for Manipulator Modeling and Control](https://doi.org/10.1177/027836499101000401), Rodriguez, Jain, Kreutz-Delgado
//!
//! ## Naming conventions
//! * Spatial vectors stack the rotational part on top of the translational part.
//! * Variables follow monogram notation in lower case: `x_wb` is the pose of body B in the world W,
//!   `p_pobo_w` the position from the origin of P to the origin of B expressed in W, `v_pb_w` the
//!   spatial velocity of B in P expressed in W.
//! * Methods – `calc_` computes from scratch, `eval_` returns a result memoized in the context.

pub mod actuator;
pub mod body;
pub mod body_node;
pub mod cache;
pub mod context;
pub mod errors;
pub mod force_element;
pub mod index;
pub mod inertia;
pub mod joint;
pub mod mobilizer;
pub mod model_instance;
pub mod spatial;
pub mod topology;
pub mod tree;

pub use actuator::JointActuator;
pub use body::{Body, Frame};
pub use body_node::BodyNode;
pub use cache::{
    AccelerationKinematicsCache, ArticulatedBodyInertiaCache, HingeMatrixCache, PositionKinematicsCache,
    VelocityKinematicsCache,
};
pub use context::{MultibodyTreeContext, TreeId};
pub use errors::{Result, TreeError};
pub use force_element::{ForceElement, MultibodyForces, UniformGravityField};
pub use index::{
    ActuatorIndex, BodyIndex, BodyNodeIndex, ForceElementIndex, FrameIndex, JointIndex, MobilizerIndex,
    ModelInstanceIndex,
};
pub use inertia::{ArticulatedBodyInertia, SpatialInertia};
pub use joint::{Joint, JointImplementation, JointKind, PrismaticJoint, QuaternionFloatingJoint, RevoluteJoint, WeldJoint};
pub use mobilizer::{Mobilizer, PrismaticMobilizer, QuaternionFloatingMobilizer, RevoluteMobilizer, WeldMobilizer};
pub use model_instance::ModelInstance;
pub use spatial::{SpatialAcceleration, SpatialForce, SpatialVelocity};
pub use topology::Topology;
pub use tree::{MultibodyTree, WORLD_BODY_NAME};

// Backends
#[cfg(feature = "faer")]
pub mod faer;
#[cfg(feature = "ndarray")]
pub mod ndarray;
