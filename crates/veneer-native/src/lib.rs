//! veneer native tree
//!
//! A compact, rule-agnostic document tree. Nodes live in an arena owned by a
//! [`NativeTree`]; handles are plain `(tree, index)` pairs. The engine
//! stores whatever structure it is told to store and only guards its own
//! storage format: element and attribute names must be XML NCNames and
//! doctype names must not be empty.

pub mod name;
mod node;
pub mod query;
mod tree;

pub use node::{NativeData, NativeKind, NativeName, NativeNode};
pub use query::{Query, QueryError, Value};
pub use tree::{Children, Descendants, NativeTree};

use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies one native tree. Handles from different trees never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(u32);

impl TreeId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        TreeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Native node handle (tree + arena index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId {
    pub(crate) tree: TreeId,
    pub(crate) index: u32,
}

impl NativeId {
    /// Tree this handle points into
    #[inline]
    pub fn tree(self) -> TreeId {
        self.tree
    }

    /// Arena slot
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Result type for native operations
pub type NativeResult<T> = Result<T, NativeError>;

/// Errors reported by the native engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NativeError {
    #[error("name {0:?} is not accepted by the native tree")]
    InvalidName(String),

    #[error("doctype name must not be empty")]
    EmptyDoctypeName,

    #[error("node {0:?} belongs to another tree")]
    ForeignNode(NativeId),

    #[error("no node at {0:?}")]
    UnknownNode(NativeId),

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NativeId, child: NativeId },

    #[error("operation does not apply to {0:?} nodes")]
    WrongKind(NativeKind),
}
