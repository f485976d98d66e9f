//! Scalar-independent description of the multibody tree.
//!
//! Bodies, frames and mobilizers are declared incrementally. [`Topology::finalize`] then walks the tree
//! breadth-first from the world body, creates one body node per body in visiting order and assigns each
//! mobilizer its contiguous slice of the position and velocity vectors.

use std::collections::VecDeque;
use std::ops::Range;

use tracing::trace;

use crate::errors::{Result, TreeError};
use crate::index::{BodyIndex, BodyNodeIndex, FrameIndex, MobilizerIndex};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyTopology {
    pub index: BodyIndex,
    pub body_frame: FrameIndex,
    pub inboard_mobilizer: Option<MobilizerIndex>,
    pub parent_body: Option<BodyIndex>,
    /// Children in the order their mobilizers were added.
    pub child_bodies: Vec<BodyIndex>,
    pub level: usize,
    pub body_node: BodyNodeIndex,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameTopology {
    pub index: FrameIndex,
    pub body: BodyIndex,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MobilizerTopology {
    pub index: MobilizerIndex,
    pub inboard_frame: FrameIndex,
    pub outboard_frame: FrameIndex,
    pub inboard_body: BodyIndex,
    pub outboard_body: BodyIndex,
    pub num_positions: usize,
    pub num_velocities: usize,
    pub positions_start: usize,
    pub velocities_start: usize,
    pub body_node: BodyNodeIndex,
}

impl MobilizerTopology {
    pub fn positions(&self) -> Range<usize> {
        self.positions_start..self.positions_start + self.num_positions
    }

    pub fn velocities(&self) -> Range<usize> {
        self.velocities_start..self.velocities_start + self.num_velocities
    }
}

/// One node of the compiled tree. The world node has no parent and no mobilizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyNodeTopology {
    pub index: BodyNodeIndex,
    pub level: usize,
    pub parent_body_node: Option<BodyNodeIndex>,
    pub body: BodyIndex,
    pub parent_body: Option<BodyIndex>,
    pub mobilizer: Option<MobilizerIndex>,
    pub mobilizer_positions_start: usize,
    pub num_mobilizer_positions: usize,
    pub mobilizer_velocities_start: usize,
    pub num_mobilizer_velocities: usize,
    pub child_nodes: Vec<BodyNodeIndex>,
}

impl BodyNodeTopology {
    pub fn positions(&self) -> Range<usize> {
        self.mobilizer_positions_start..self.mobilizer_positions_start + self.num_mobilizer_positions
    }

    pub fn velocities(&self) -> Range<usize> {
        self.mobilizer_velocities_start..self.mobilizer_velocities_start + self.num_mobilizer_velocities
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    bodies: Vec<BodyTopology>,
    frames: Vec<FrameTopology>,
    mobilizers: Vec<MobilizerTopology>,
    body_nodes: Vec<BodyNodeTopology>,
    levels: Vec<Vec<BodyNodeIndex>>,
    num_positions: usize,
    num_velocities: usize,
    is_valid: bool,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    /// A topology containing only the world body and its frame.
    pub fn new() -> Self {
        let mut topology = Self {
            bodies: Vec::new(),
            frames: Vec::new(),
            mobilizers: Vec::new(),
            body_nodes: Vec::new(),
            levels: Vec::new(),
            num_positions: 0,
            num_velocities: 0,
            is_valid: false,
        };
        topology.push_body();
        topology
    }

    fn push_body(&mut self) -> (BodyIndex, FrameIndex) {
        let body = BodyIndex(self.bodies.len());
        let frame = FrameIndex(self.frames.len());
        self.frames.push(FrameTopology { index: frame, body });
        self.bodies.push(BodyTopology {
            index: body,
            body_frame: frame,
            inboard_mobilizer: None,
            parent_body: None,
            child_bodies: Vec::new(),
            level: 0,
            body_node: BodyNodeIndex::default(),
        });
        (body, frame)
    }

    fn throw_if_valid(&self, operation: &'static str) -> Result<()> {
        if self.is_valid {
            Err(TreeError::AlreadyFinalized(operation))
        } else {
            Ok(())
        }
    }

    pub fn add_body(&mut self) -> Result<(BodyIndex, FrameIndex)> {
        self.throw_if_valid("add_body")?;
        Ok(self.push_body())
    }

    pub fn add_frame(&mut self, body: BodyIndex) -> Result<FrameIndex> {
        self.throw_if_valid("add_frame")?;
        self.body(body)?;
        let frame = FrameIndex(self.frames.len());
        self.frames.push(FrameTopology { index: frame, body });
        Ok(frame)
    }

    /// Connects the body of `outboard_frame` to the body of `inboard_frame`.
    pub fn add_mobilizer(
        &mut self,
        inboard_frame: FrameIndex,
        outboard_frame: FrameIndex,
        num_positions: usize,
        num_velocities: usize,
    ) -> Result<MobilizerIndex> {
        self.throw_if_valid("add_mobilizer")?;
        let inboard_body = self.frame(inboard_frame)?.body;
        let outboard_body = self.frame(outboard_frame)?.body;
        if outboard_body == BodyIndex::WORLD {
            return Err(TreeError::WorldAsOutboard);
        }
        if inboard_body == outboard_body {
            return Err(TreeError::SelfConnectingMobilizer(outboard_body));
        }
        if self.bodies[outboard_body.0].inboard_mobilizer.is_some() {
            return Err(TreeError::InboardMobilizerExists(outboard_body));
        }

        let index = MobilizerIndex(self.mobilizers.len());
        self.mobilizers.push(MobilizerTopology {
            index,
            inboard_frame,
            outboard_frame,
            inboard_body,
            outboard_body,
            num_positions,
            num_velocities,
            positions_start: 0,
            velocities_start: 0,
            body_node: BodyNodeIndex::default(),
        });
        let outboard = &mut self.bodies[outboard_body.0];
        outboard.inboard_mobilizer = Some(index);
        outboard.parent_body = Some(inboard_body);
        self.bodies[inboard_body.0].child_bodies.push(outboard_body);
        Ok(index)
    }

    /// Removes every mobilizer at or after `len`, undoing their parent/child links.
    pub fn truncate_mobilizers(&mut self, len: usize) {
        while self.mobilizers.len() > len {
            let Some(mobilizer) = self.mobilizers.pop() else { break };
            let outboard = &mut self.bodies[mobilizer.outboard_body.0];
            outboard.inboard_mobilizer = None;
            outboard.parent_body = None;
            self.bodies[mobilizer.inboard_body.0]
                .child_bodies
                .retain(|&child| child != mobilizer.outboard_body);
        }
        self.is_valid = false;
        self.body_nodes.clear();
        self.levels.clear();
        self.num_positions = 0;
        self.num_velocities = 0;
    }

    /// Non-world bodies that have no inboard mobilizer yet.
    pub fn bodies_without_inboard_mobilizer(&self) -> Vec<BodyIndex> {
        self.bodies
            .iter()
            .skip(1)
            .filter(|body| body.inboard_mobilizer.is_none())
            .map(|body| body.index)
            .collect()
    }

    /// Compiles the breadth-first node structure and the state offsets.
    ///
    /// Nothing is modified if a body is not connected to the world.
    pub fn finalize(&mut self) -> Result<()> {
        self.throw_if_valid("finalize")?;

        let mut node_of_body: Vec<Option<BodyNodeIndex>> = vec![None; self.bodies.len()];
        let mut body_nodes: Vec<BodyNodeTopology> = Vec::with_capacity(self.bodies.len());
        let mut levels: Vec<Vec<BodyNodeIndex>> = Vec::new();
        let (mut num_positions, mut num_velocities) = (0, 0);

        let mut queue = VecDeque::from([(BodyIndex::WORLD, 0usize)]);
        while let Some((body, level)) = queue.pop_front() {
            let node = BodyNodeIndex(body_nodes.len());
            node_of_body[body.0] = Some(node);
            if levels.len() == level {
                levels.push(Vec::new());
            }
            levels[level].push(node);

            let body_topology = &self.bodies[body.0];
            let parent_body_node = body_topology.parent_body.and_then(|parent| node_of_body[parent.0]);
            let (nq, nv) = body_topology
                .inboard_mobilizer
                .map(|m| (self.mobilizers[m.0].num_positions, self.mobilizers[m.0].num_velocities))
                .unwrap_or((0, 0));

            trace!(%node, %body, level, nq, nv, "compiled body node");
            body_nodes.push(BodyNodeTopology {
                index: node,
                level,
                parent_body_node,
                body,
                parent_body: body_topology.parent_body,
                mobilizer: body_topology.inboard_mobilizer,
                mobilizer_positions_start: num_positions,
                num_mobilizer_positions: nq,
                mobilizer_velocities_start: num_velocities,
                num_mobilizer_velocities: nv,
                child_nodes: Vec::new(),
            });
            if let Some(parent) = parent_body_node {
                body_nodes[parent.0].child_nodes.push(node);
            }
            num_positions += nq;
            num_velocities += nv;

            queue.extend(body_topology.child_bodies.iter().map(|&child| (child, level + 1)));
        }

        if let Some(orphan) = node_of_body.iter().position(Option::is_none) {
            return Err(TreeError::Disconnected(BodyIndex(orphan)));
        }

        for node in &body_nodes {
            let body = &mut self.bodies[node.body.0];
            body.level = node.level;
            body.body_node = node.index;
            if let Some(mobilizer) = node.mobilizer {
                let mobilizer = &mut self.mobilizers[mobilizer.0];
                mobilizer.positions_start = node.mobilizer_positions_start;
                mobilizer.velocities_start = node.mobilizer_velocities_start;
                mobilizer.body_node = node.index;
            }
        }
        self.body_nodes = body_nodes;
        self.levels = levels;
        self.num_positions = num_positions;
        self.num_velocities = num_velocities;
        self.is_valid = true;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
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

    pub fn num_body_nodes(&self) -> usize {
        self.body_nodes.len()
    }

    pub fn num_positions(&self) -> usize {
        self.num_positions
    }

    pub fn num_velocities(&self) -> usize {
        self.num_velocities
    }

    /// Number of levels, world included. A tree holding only the world has height 1.
    pub fn tree_height(&self) -> usize {
        self.levels.len()
    }

    /// Body nodes grouped by depth; level 0 holds only the world node.
    pub fn levels(&self) -> &[Vec<BodyNodeIndex>] {
        &self.levels
    }

    pub fn body(&self, index: BodyIndex) -> Result<&BodyTopology> {
        self.bodies.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "body",
            index: index.0,
        })
    }

    pub fn frame(&self, index: FrameIndex) -> Result<&FrameTopology> {
        self.frames.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "frame",
            index: index.0,
        })
    }

    pub fn mobilizer(&self, index: MobilizerIndex) -> Result<&MobilizerTopology> {
        self.mobilizers.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "mobilizer",
            index: index.0,
        })
    }

    pub fn body_node(&self, index: BodyNodeIndex) -> Result<&BodyNodeTopology> {
        self.body_nodes.get(index.0).ok_or(TreeError::IndexOutOfBound {
            kind: "body node",
            index: index.0,
        })
    }

    pub fn bodies(&self) -> &[BodyTopology] {
        &self.bodies
    }

    pub fn mobilizers(&self) -> &[MobilizerTopology] {
        &self.mobilizers
    }

    pub fn body_nodes(&self) -> &[BodyNodeTopology] {
        &self.body_nodes
    }

    /// Body nodes from the world down to `node`, both included.
    pub fn kinematic_path_to_world(&self, node: BodyNodeIndex) -> Result<Vec<BodyNodeIndex>> {
        let mut path = vec![self.body_node(node)?.index];
        let mut current = node;
        while let Some(parent) = self.body_nodes[current.0].parent_body_node {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        Ok(path)
    }
}
