//! Load path errors

use veneer_dom::DomError;
use veneer_native::NativeError;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("native tree rejected parsed content: {0}")]
    Native(#[from] NativeError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("fragment container was not produced by the tree builder")]
    MissingFragment,
}
