use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a syntax node.
///
/// Ids are handed out by a [`NodeIdGen`] that lives as long as the session, so nodes parsed
/// from different REPL entries never collide and side tables keyed by id can be kept for the
/// whole session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Placeholder used by synthesized nodes that never reach a side table.
    pub const DUMMY: NodeId = NodeId(u32::MAX);
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next call to [`NodeIdGen::next_id`] hands out. Nodes parsed between two
    /// peeks have ids in that half-open range.
    pub fn peek(&self) -> NodeId {
        NodeId(self.next)
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_and_unique() {
        let mut ids = NodeIdGen::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert_eq!(format!("{b:?}"), "#1");
    }
}
