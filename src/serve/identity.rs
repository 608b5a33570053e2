//! Encoded identities
//!
//! Some deployments pass the identity through `authorized_keys` in an
//! encoded form so that arbitrary key comments survive the shell: the
//! literal prefix `git` followed by URL-safe base64 with `=` padding
//! replaced by `.`.

use crate::error::ProtocolError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

/// Prefix marking an encoded identity
pub const ENCODED_PREFIX: &str = "git";

pub fn encode_identity(raw: &str) -> String {
    format!(
        "{ENCODED_PREFIX}{}",
        URL_SAFE.encode(raw.as_bytes()).replace('=', ".")
    )
}

/// Decode an identity produced by [`encode_identity`].
///
/// Rejects a missing prefix, malformed base64, non-UTF-8 content and any
/// decoded value containing a newline.
pub fn decode_identity(encoded: &str) -> Result<String, ProtocolError> {
    let body = encoded
        .strip_prefix(ENCODED_PREFIX)
        .ok_or(ProtocolError::BadEncodedId)?;

    let bytes = URL_SAFE
        .decode(body.replace('.', "="))
        .map_err(|_| ProtocolError::BadEncodedId)?;
    let identity = String::from_utf8(bytes).map_err(|_| ProtocolError::BadEncodedId)?;

    if identity.is_empty() || identity.contains('\n') {
        return Err(ProtocolError::BadEncodedId);
    }
    Ok(identity)
}
