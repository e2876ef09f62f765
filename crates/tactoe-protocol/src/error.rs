//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating
/// messages on the wire.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, an
    /// unknown `method` tag, or a value outside an enum's range.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but breaks a protocol rule, e.g. a
    /// request sent before the handshake or a version mismatch.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
