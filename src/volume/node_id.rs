//! Packed octree node identifier
//!
//! A node id packs the octree level, the block position at that level and
//! the time step into one `u64` (least significant bits first):
//!
//! | bits  | field |
//! |-------|-------|
//! | 0-3   | level |
//! | 4-17  | x     |
//! | 18-31 | y     |
//! | 32-45 | z     |
//! | 46-63 | frame |
//!
//! All relations (parent, children, ancestry) are computed with shifts on
//! the position, so ids are `Copy`, hashable and usable as cache keys from
//! any thread.

use std::fmt;

use crate::core::types::UVec3;

const LEVEL_BITS: u32 = 4;
const POSITION_BITS: u32 = 14;
const FRAME_BITS: u32 = 18;

const X_SHIFT: u32 = LEVEL_BITS;
const Y_SHIFT: u32 = X_SHIFT + POSITION_BITS;
const Z_SHIFT: u32 = Y_SHIFT + POSITION_BITS;
const FRAME_SHIFT: u32 = Z_SHIFT + POSITION_BITS;

const LEVEL_MASK: u64 = (1 << LEVEL_BITS) - 1;
const POSITION_MASK: u64 = (1 << POSITION_BITS) - 1;
const FRAME_MASK: u64 = (1 << FRAME_BITS) - 1;

/// Level value reserved for the invalid id
pub const INVALID_LEVEL: u32 = LEVEL_MASK as u32;
/// Finest level a node id can address
pub const MAX_LEVEL: u32 = INVALID_LEVEL - 1;
/// Position component reserved for the invalid id
pub const INVALID_POSITION: u32 = POSITION_MASK as u32;
/// Largest frame index that fits in the id
pub const MAX_FRAME: u32 = FRAME_MASK as u32;

/// Identifier of one brick: level, block position and frame
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Sentinel returned by relations that have no answer (e.g. parent of a root)
    pub const INVALID: NodeId = NodeId(u64::MAX);

    /// Pack a node id
    ///
    /// Components are masked to their field widths.
    pub fn new(level: u32, position: UVec3, frame: u32) -> Self {
        debug_assert!(level <= MAX_LEVEL, "level {level} out of range");
        let raw = (level as u64 & LEVEL_MASK)
            | ((position.x as u64 & POSITION_MASK) << X_SHIFT)
            | ((position.y as u64 & POSITION_MASK) << Y_SHIFT)
            | ((position.z as u64 & POSITION_MASK) << Z_SHIFT)
            | ((frame as u64 & FRAME_MASK) << FRAME_SHIFT);
        Self(raw)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn level(self) -> u32 {
        (self.0 & LEVEL_MASK) as u32
    }

    pub fn position(self) -> UVec3 {
        UVec3::new(
            ((self.0 >> X_SHIFT) & POSITION_MASK) as u32,
            ((self.0 >> Y_SHIFT) & POSITION_MASK) as u32,
            ((self.0 >> Z_SHIFT) & POSITION_MASK) as u32,
        )
    }

    pub fn frame(self) -> u32 {
        ((self.0 >> FRAME_SHIFT) & FRAME_MASK) as u32
    }

    /// Same block in another frame
    pub fn with_frame(self, frame: u32) -> Self {
        Self::new(self.level(), self.position(), frame)
    }

    /// True unless this is the sentinel or carries a reserved level/position
    pub fn is_valid(self) -> bool {
        let p = self.position();
        self.level() != INVALID_LEVEL
            && p.x != INVALID_POSITION
            && p.y != INVALID_POSITION
            && p.z != INVALID_POSITION
    }

    pub fn is_root(self) -> bool {
        self.is_valid() && self.level() == 0
    }

    /// Parent node, or [`NodeId::INVALID`] for roots and invalid ids
    pub fn parent(self) -> NodeId {
        if !self.is_valid() || self.level() == 0 {
            return NodeId::INVALID;
        }
        NodeId::new(self.level() - 1, self.position() >> 1, self.frame())
    }

    /// All ancestors, nearest first, ending with the root
    pub fn parents(self) -> Vec<NodeId> {
        let mut parents = Vec::with_capacity(self.level() as usize);
        let mut current = self.parent();
        while current.is_valid() {
            parents.push(current);
            current = current.parent();
        }
        parents
    }

    /// Level-0 ancestor (or self for roots)
    pub fn root(self) -> NodeId {
        if !self.is_valid() {
            return NodeId::INVALID;
        }
        NodeId::new(0, self.position() >> self.level(), self.frame())
    }

    /// The eight children, z varying fastest
    ///
    /// Empty for invalid ids and ids at [`MAX_LEVEL`].
    pub fn children(self) -> Vec<NodeId> {
        if !self.is_valid() || self.level() >= MAX_LEVEL {
            return Vec::new();
        }
        let base = self.position() << 1;
        let level = self.level() + 1;
        let mut children = Vec::with_capacity(8);
        for x in 0..2 {
            for y in 0..2 {
                for z in 0..2 {
                    children.push(NodeId::new(level, base + UVec3::new(x, y, z), self.frame()));
                }
            }
        }
        children
    }

    /// Every descendant at `level`
    ///
    /// Returns an empty list when `level` is not strictly finer than this node.
    pub fn children_at_level(self, level: u32) -> Vec<NodeId> {
        if !self.is_valid() || level <= self.level() || level > MAX_LEVEL {
            return Vec::new();
        }
        let shift = level - self.level();
        let extent = 1u32 << shift;
        let base = self.position() << shift;
        let mut children = Vec::with_capacity((extent as usize).pow(3));
        for x in 0..extent {
            for y in 0..extent {
                for z in 0..extent {
                    children.push(NodeId::new(level, base + UVec3::new(x, y, z), self.frame()));
                }
            }
        }
        children
    }

    /// Children of the parent (including self); empty for roots
    pub fn siblings(self) -> Vec<NodeId> {
        let parent = self.parent();
        if !parent.is_valid() {
            return Vec::new();
        }
        parent.children()
    }

    /// True if `self` is a strict ancestor of `other` in the same frame
    pub fn is_parent_of(self, other: NodeId) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        if self.frame() != other.frame() || self.level() >= other.level() {
            return false;
        }
        (other.position() >> (other.level() - self.level())) == self.position()
    }

    /// True if `self` is a strict descendant of `other` in the same frame
    pub fn is_child_of(self, other: NodeId) -> bool {
        other.is_parent_of(self)
    }

    /// Fraction of the level this node covers in linear block order
    ///
    /// Blocks at a level are ordered `x * w² + y * w + z` with `w = 2^level`;
    /// the returned half-open interval is used for sort-last partitioning.
    pub fn range(self) -> [f64; 2] {
        let width = (1u64 << self.level()) as f64;
        let count = width * width * width;
        let p = self.position().as_dvec3();
        let index = p.x * width * width + p.y * width + p.z;
        [index / count, (index + 1.0) / count]
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::INVALID
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "invalid");
        }
        let p = self.position();
        write!(f, "{}:{},{},{}@{}", self.level(), p.x, p.y, p.z, self.frame())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(level: u32, x: u32, y: u32, z: u32) -> NodeId {
        NodeId::new(level, UVec3::new(x, y, z), 0)
    }

    #[test]
    fn test_pack_unpack() {
        let id = NodeId::new(5, UVec3::new(17, 3, 31), 1234);
        assert_eq!(id.level(), 5);
        assert_eq!(id.position(), UVec3::new(17, 3, 31));
        assert_eq!(id.frame(), 1234);
        assert!(id.is_valid());
        assert_eq!(NodeId::from_raw(id.raw()), id);
    }

    #[test]
    fn test_field_layout() {
        let id = NodeId::new(1, UVec3::new(1, 1, 1), 1);
        assert_eq!(id.raw(), 1 | (1 << 4) | (1 << 18) | (1 << 32) | (1 << 46));
    }

    #[test]
    fn test_invalid() {
        assert!(!NodeId::INVALID.is_valid());
        assert_eq!(NodeId::INVALID.level(), INVALID_LEVEL);
        assert_eq!(NodeId::INVALID.position(), UVec3::splat(INVALID_POSITION));
        assert_eq!(NodeId::default(), NodeId::INVALID);
        assert!(!NodeId::INVALID.parent().is_valid());
        assert!(NodeId::INVALID.children().is_empty());
    }

    #[test]
    fn test_parent() {
        let id = node(3, 5, 2, 7);
        assert_eq!(id.parent(), node(2, 2, 1, 3));
        assert!(!node(0, 0, 0, 0).parent().is_valid());

        let framed = NodeId::new(2, UVec3::new(3, 3, 3), 9);
        assert_eq!(framed.parent().frame(), 9);
    }

    #[test]
    fn test_parents_chain() {
        let id = node(3, 7, 0, 4);
        assert_eq!(id.parents(), vec![node(2, 3, 0, 2), node(1, 1, 0, 1), node(0, 0, 0, 0)]);
        assert!(node(0, 0, 0, 0).parents().is_empty());
    }

    #[test]
    fn test_children() {
        let id = node(1, 1, 0, 1);
        let children = id.children();
        assert_eq!(children.len(), 8);
        assert_eq!(children[0], node(2, 2, 0, 2));
        // z varies fastest, then y, then x
        assert_eq!(children[1], node(2, 2, 0, 3));
        assert_eq!(children[2], node(2, 2, 1, 2));
        assert_eq!(children[4], node(2, 3, 0, 2));
        assert_eq!(children[7], node(2, 3, 1, 3));
        assert!(children.iter().all(|c| c.parent() == id));
    }

    #[test]
    fn test_parent_children_contains_self() {
        for level in 1..6 {
            let extent = 1u32 << level;
            for (x, y, z) in [(0, 0, 0), (extent - 1, 0, 1), (1, extent - 1, extent - 1)] {
                let id = node(level, x, y, z);
                assert!(id.parent().children().contains(&id), "{id}");
            }
        }
    }

    #[test]
    fn test_parent_child_duality() {
        let id = node(4, 9, 12, 3);
        let parent = id.parent();

        assert!(!id.is_parent_of(parent));
        assert!(parent.is_parent_of(id));
        assert!(id.is_child_of(parent));
        assert!(!parent.is_child_of(id));

        for ancestor in id.parents() {
            assert_eq!(id.is_child_of(ancestor), ancestor.is_parent_of(id));
            assert!(ancestor.is_parent_of(id));
        }

        // Not reflexive, not across frames
        assert!(!id.is_parent_of(id));
        assert!(!parent.is_parent_of(id.with_frame(1)));
        // Cousin is not a descendant
        assert!(!parent.is_parent_of(node(4, 0, 0, 0)));
    }

    #[test]
    fn test_children_at_level() {
        let id = node(1, 1, 0, 0);
        let grandchildren = id.children_at_level(3);
        assert_eq!(grandchildren.len(), 64);
        assert!(grandchildren.iter().all(|c| c.level() == 3 && id.is_parent_of(*c)));
        assert_eq!(id.children_at_level(2), id.children());
        assert!(id.children_at_level(1).is_empty());
    }

    #[test]
    fn test_siblings() {
        let id = node(2, 1, 2, 3);
        let siblings = id.siblings();
        assert_eq!(siblings.len(), 8);
        assert!(siblings.contains(&id));
        assert!(node(0, 0, 0, 0).siblings().is_empty());
    }

    #[test]
    fn test_root() {
        assert_eq!(node(3, 7, 5, 2).root(), node(0, 0, 0, 0));
        // Volumes with several root blocks keep the root position
        assert_eq!(node(2, 5, 1, 0).root(), node(0, 1, 0, 0));
    }

    #[test]
    fn test_range() {
        assert_eq!(node(0, 0, 0, 0).range(), [0.0, 1.0]);
        assert_eq!(node(1, 0, 0, 0).range(), [0.0, 0.125]);
        assert_eq!(node(1, 1, 1, 1).range(), [0.875, 1.0]);
        assert_eq!(node(1, 0, 0, 1).range(), [0.125, 0.25]);
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeId::new(2, UVec3::new(1, 2, 3), 4).to_string(), "2:1,2,3@4");
        assert_eq!(NodeId::INVALID.to_string(), "invalid");
    }
}
