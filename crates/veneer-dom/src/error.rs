//! DOM errors
//!
//! One variant per DOMException name the overlay can raise, plus `Type`
//! for argument-shape failures and `Invariant` for broken internal
//! assumptions.

use veneer_native::{NativeError, QueryError};

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("HierarchyRequestError: {0}")]
    HierarchyRequest(&'static str),

    #[error("NotFoundError: {0}")]
    NotFound(&'static str),

    #[error("WrongDocumentError: node belongs to another document")]
    WrongDocument,

    #[error("InvalidCharacterError: {0:?} is not valid here")]
    InvalidCharacter(String),

    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("NamespaceError: {0}")]
    Namespace(&'static str),

    #[error("InUseAttributeError: attribute already belongs to another element")]
    InUseAttribute,

    #[error("InvalidStateError: {0}")]
    InvalidState(&'static str),

    #[error("IndexSizeError: offset {0} is out of range")]
    IndexSize(usize),

    #[error("NotSupportedError: {0}")]
    NotSupported(&'static str),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("identity conflict: native node is already bound to another wrapper")]
    IdentityConflict,

    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Coarse error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Tree shape rules
    Structural,
    /// Names, tokens and expressions
    Lexical,
    Namespace,
    /// Cross-document usage, missing nodes, wrapper binding
    Identity,
    Unsupported,
    Type,
    Internal,
}

impl DomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomError::HierarchyRequest(_)
            | DomError::InUseAttribute
            | DomError::InvalidState(_)
            | DomError::IndexSize(_) => ErrorKind::Structural,
            DomError::InvalidCharacter(_) | DomError::Syntax(_) => ErrorKind::Lexical,
            DomError::Namespace(_) => ErrorKind::Namespace,
            DomError::NotFound(_) | DomError::WrongDocument | DomError::IdentityConflict => ErrorKind::Identity,
            DomError::NotSupported(_) => ErrorKind::Unsupported,
            DomError::Type(_) => ErrorKind::Type,
            DomError::Invariant(_) => ErrorKind::Internal,
        }
    }

    /// DOMException name, where there is one
    pub fn name(&self) -> &'static str {
        match self {
            DomError::HierarchyRequest(_) => "HierarchyRequestError",
            DomError::NotFound(_) => "NotFoundError",
            DomError::WrongDocument => "WrongDocumentError",
            DomError::InvalidCharacter(_) => "InvalidCharacterError",
            DomError::Syntax(_) => "SyntaxError",
            DomError::Namespace(_) => "NamespaceError",
            DomError::InUseAttribute => "InUseAttributeError",
            DomError::InvalidState(_) => "InvalidStateError",
            DomError::IndexSize(_) => "IndexSizeError",
            DomError::NotSupported(_) => "NotSupportedError",
            DomError::Type(_) => "TypeError",
            DomError::IdentityConflict | DomError::Invariant(_) => "InternalError",
        }
    }

    /// Native failure after validation passed
    pub(crate) fn invariant(err: NativeError) -> Self {
        tracing::error!(error = %err, "native tree rejected a validated operation");
        DomError::Invariant(err.to_string())
    }

    pub(crate) fn detached() -> Self {
        DomError::InvalidState("owner document has been dropped")
    }
}

impl From<QueryError> for DomError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotANodeSet => DomError::Type(err.to_string()),
            QueryError::ForeignContext => DomError::WrongDocument,
            other => DomError::Syntax(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(DomError::HierarchyRequest("x").kind(), ErrorKind::Structural);
        assert_eq!(DomError::WrongDocument.kind(), ErrorKind::Identity);
        assert_eq!(DomError::InvalidCharacter("<".into()).kind(), ErrorKind::Lexical);
        assert_eq!(DomError::NotSupported("cdata").kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_query_error_mapping() {
        assert_eq!(DomError::from(QueryError::NotANodeSet).kind(), ErrorKind::Type);
        assert_eq!(
            DomError::from(QueryError::UnknownFunction("f".into())).name(),
            "SyntaxError"
        );
        assert_eq!(DomError::from(QueryError::ForeignContext), DomError::WrongDocument);
    }
}
