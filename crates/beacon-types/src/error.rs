//! Error types for the types crate.

/// Errors produced while parsing peer types or decoding member tags.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// The peer type token is empty, too long, or contains disallowed characters.
    #[error("invalid peer type {0:?}")]
    InvalidPeerType(String),

    /// A required tag is absent from a member's tag set.
    #[error("missing {0} tag")]
    MissingTag(&'static str),

    /// A tag is present but its value could not be parsed.
    #[error("invalid {tag} tag: {value:?}")]
    InvalidTag {
        /// Tag key.
        tag: &'static str,
        /// The offending value.
        value: String,
    },
}
