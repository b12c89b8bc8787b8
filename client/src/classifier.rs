//! Classification of wire-level error tokens.

use signpost_types::wire::token;

/// The fixed vocabulary of structured rejection kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadSignature,
    /// Unknown, duplicate, or otherwise invalid account/guid/alias.
    InvalidIdentity,
    /// Duplicate or missing field.
    InvalidField,
    InvalidGroup,
    AccessDenied,
    DuplicateName,
    VerificationFailed,
    Timeout,
    /// Fallback; the raw token is preserved alongside this kind.
    Unclassified,
}

/// Map a wire token to its kind. Total: unknown tokens classify as
/// [`ErrorKind::Unclassified`], never an error.
pub fn classify(raw: &str) -> ErrorKind {
    match raw {
        token::BAD_SIGNATURE => ErrorKind::BadSignature,
        token::BAD_GUID
        | token::DUPLICATE_GUID
        | token::BAD_ACCOUNT
        | token::BAD_ALIAS
        | token::DUPLICATE_ALIAS => ErrorKind::InvalidIdentity,
        token::DUPLICATE_FIELD | token::FIELD_NOT_FOUND => ErrorKind::InvalidField,
        token::BAD_GROUP | token::DUPLICATE_GROUP => ErrorKind::InvalidGroup,
        token::ACCESS_DENIED => ErrorKind::AccessDenied,
        token::DUPLICATE_NAME => ErrorKind::DuplicateName,
        token::VERIFICATION_ERROR => ErrorKind::VerificationFailed,
        token::TIMEOUT => ErrorKind::Timeout,
        _ => ErrorKind::Unclassified,
    }
}
