//! Native node storage
//!
//! Links are arena indices rather than pointers, so a node is a handful of
//! `u32`s plus its payload.

/// Arena node
#[derive(Debug, Clone)]
pub struct NativeNode {
    pub(crate) parent: Option<u32>,
    pub(crate) first_child: Option<u32>,
    pub(crate) last_child: Option<u32>,
    pub(crate) prev_sibling: Option<u32>,
    pub(crate) next_sibling: Option<u32>,
    pub(crate) data: NativeData,
}

impl NativeNode {
    pub(crate) fn new(data: NativeData) -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            data,
        }
    }

    /// Node payload
    #[inline]
    pub fn data(&self) -> &NativeData {
        &self.data
    }

    #[inline]
    pub fn kind(&self) -> NativeKind {
        self.data.kind()
    }
}

/// Node payload
#[derive(Debug, Clone)]
pub enum NativeData {
    Document,
    Fragment,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element {
        name: NativeName,
        /// Attribute node indices, in insertion order
        attrs: Vec<u32>,
    },
    Attribute {
        name: NativeName,
        value: String,
        owner: Option<u32>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

impl NativeData {
    pub fn kind(&self) -> NativeKind {
        match self {
            NativeData::Document => NativeKind::Document,
            NativeData::Fragment => NativeKind::Fragment,
            NativeData::Doctype { .. } => NativeKind::Doctype,
            NativeData::Element { .. } => NativeKind::Element,
            NativeData::Attribute { .. } => NativeKind::Attribute,
            NativeData::Text(_) => NativeKind::Text,
            NativeData::Comment(_) => NativeKind::Comment,
            NativeData::ProcessingInstruction { .. } => NativeKind::ProcessingInstruction,
        }
    }
}

/// Node kind without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Document,
    Fragment,
    Doctype,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// Stored element or attribute name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeName {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

impl NativeName {
    pub fn new(namespace: Option<&str>, prefix: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_owned),
            prefix: prefix.map(str::to_owned),
            local: local.to_owned(),
        }
    }

    /// `prefix:local`, or `local` when there is no prefix
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }

    /// Same namespace and local name
    pub fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local == local
    }
}
