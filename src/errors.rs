//! Provides the error type used throughout this crate.

use thiserror::Error;

use crate::index::BodyIndex;

/// Shorthand for results carrying a [`TreeError`].
pub type Result<T> = std::result::Result<T, TreeError>;

/// The error type used throughout this crate.
///
/// Sequencing errors name the operation that was called at the wrong time. All other variants
/// describe a malformed model or arguments of the wrong shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    // Lifecycle
    #[error(
        "Post-finalize calls to '{0}()' are not allowed; calls to this method must happen before finalize()."
    )]
    AlreadyFinalized(&'static str),
    #[error("Pre-finalize calls to '{0}()' are not allowed; you must call finalize() first.")]
    NotFinalized(&'static str),
    #[error("The context provided is not compatible with a multibody model.")]
    IncompatibleContext,

    // Selectors and queries
    #[error("Joint named '{0}' is repeated multiple times.")]
    RepeatedJoint(String),
    #[error("Actuator named '{0}' is repeated multiple times.")]
    RepeatedActuator(String),
    #[error("Joint '{0}' does not have an actuator.")]
    UnactuatedJoint(String),
    #[error("Body '{0}' is not a free floating body.")]
    NotFreeBody(String),

    // Topology
    #[error("Body {0} already has an inboard mobilizer.")]
    InboardMobilizerExists(BodyIndex),
    #[error("The world body cannot be the outboard body of a mobilizer.")]
    WorldAsOutboard,
    #[error("Mobilizer connects {0} to itself.")]
    SelfConnectingMobilizer(BodyIndex),
    #[error("Body {0} is not connected to the world.")]
    Disconnected(BodyIndex),
    #[error("The {0} axis has zero length.")]
    ZeroAxis(&'static str),
    #[error("Joint '{0}' produced no mobilizer.")]
    EmptyJointImplementation(String),
    #[error("Joint '{joint}' has {dofs} degrees of freedom; only single-dof joints can be actuated.")]
    ActuatedJointDofs { joint: String, dofs: usize },

    // Lookup
    #[error("No {kind} named '{name}'.")]
    UnknownName { kind: &'static str, name: String },
    #[error("The {kind} index {index} is out of bound.")]
    IndexOutOfBound { kind: &'static str, index: usize },
    #[error("The {kind} name '{name}' is not unique.")]
    NotUnique { kind: &'static str, name: String },

    // Numerics
    #[error("Wrong dimension of {what}: expected {expected}, got {actual}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("The articulated inertia projected onto the mobilizer of {0} is not positive definite.")]
    SingularArticulatedInertia(BodyIndex),
    #[error("A uniform gravity field has already been added to this model.")]
    GravityFieldExists,
}

/// Returns a [`TreeError::DimensionMismatch`] unless `actual == expected`.
pub(crate) fn check_dimension(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(TreeError::DimensionMismatch { what, expected, actual })
    }
}
