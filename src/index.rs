//! Typed indices into the arenas owned by a [`MultibodyTree`](crate::MultibodyTree).
//!
//! Every element of the tree is addressed by a plain `usize` wrapped into a distinct newtype, so that a
//! body index can never be used where a mobilizer index is expected.

use std::fmt;

macro_rules! typed_index {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub usize);

        impl $name {
            /// The raw position in the owning arena.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value)
            }
        }

        impl From<$name> for usize {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

typed_index!(
    /// Index of a [`Body`](crate::Body). Index 0 is always the world body.
    BodyIndex,
    "body"
);
typed_index!(
    /// Index of a [`Frame`](crate::Frame). Index 0 is always the world frame.
    FrameIndex,
    "frame"
);
typed_index!(MobilizerIndex, "mobilizer");
typed_index!(JointIndex, "joint");
typed_index!(
    /// Index of a [`JointActuator`](crate::JointActuator). Doubles as the offset into the actuation vector.
    ActuatorIndex,
    "actuator"
);
typed_index!(ForceElementIndex, "force element");
typed_index!(ModelInstanceIndex, "model instance");
typed_index!(
    /// Index of a body node, i.e., the position of a body in breadth-first order.
    BodyNodeIndex,
    "body node"
);

impl BodyIndex {
    pub const WORLD: Self = Self(0);
}

impl FrameIndex {
    pub const WORLD: Self = Self(0);
}

impl BodyNodeIndex {
    pub const WORLD: Self = Self(0);
}

impl ModelInstanceIndex {
    pub const WORLD: Self = Self(0);
    pub const DEFAULT: Self = Self(1);
}
