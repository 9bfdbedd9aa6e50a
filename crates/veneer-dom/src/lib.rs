//! veneer DOM overlay
//!
//! A WHATWG-style DOM on top of the rule-agnostic [`veneer_native`] tree.
//! The overlay owns the rules the native engine does not know about:
//!
//! - one wrapper [`Node`] per native node, with stable identity
//! - structural validation of every mutation
//! - coercion of names the native engine refuses to store
//! - HTML serialization with optional pretty printing
//!
//! Everything is single-threaded: documents are `Rc`-shared and wrappers
//! only hold weak references back to them.

pub mod coercion;
mod collection;
mod config;
mod document;
mod element;
mod error;
mod identity;
mod mutation;
pub mod namespace;
mod node;
mod query;
pub mod selector;
mod serializer;
mod template;
mod token_list;
mod walk;

pub use collection::{HtmlCollection, NamedNodeMap, NodeList};
pub use config::SerializerConfig;
pub use document::{Document, LoadedTree, QuirksMode, DOCTYPE_PLACEHOLDER};
pub use error::{DomError, DomResult, ErrorKind};
pub use mutation::Child;
pub use node::{ElementKind, Node, NodeKind, NodeType, WeakNode};
pub use query::{QueryResult, ResolvedNodes, ResultShape};
pub use serializer::HtmlSerializer;
pub use token_list::TokenList;
pub use walk::{Moonwalk, Walk};

pub use veneer_native::{NativeId, NativeTree};
