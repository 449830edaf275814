//! Response-buffer growth for variable-length native replies.
//!
//! Vendor SDKs answer string queries into a caller-supplied buffer and fail
//! when the reply does not fit. This is the only native failure that is
//! retried: the buffer is doubled until the reply fits or the ceiling is hit.
//! Every other error is returned immediately.

use crate::error::{NativeError, NativeErrorKind};
use serde::{Deserialize, Serialize};

/// Bounds for the response buffer used by string queries.
///
/// # Example
///
/// ```rust
/// use olive_core::retry::ResponseBufferPolicy;
///
/// let policy = ResponseBufferPolicy::default();
/// assert_eq!(policy.initial_bytes, 1024);
/// assert_eq!(policy.max_bytes, 1024 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseBufferPolicy {
    /// Size of the first attempt in bytes.
    pub initial_bytes: usize,
    /// Hard ceiling; no attempt is made with a larger buffer.
    pub max_bytes: usize,
}

impl Default for ResponseBufferPolicy {
    fn default() -> Self {
        Self {
            initial_bytes: 1024,
            max_bytes: 1024 * 1024,
        }
    }
}

/// Run `query` with a growing buffer until it stops reporting
/// [`NativeErrorKind::BufferTooSmall`].
///
/// Returns the last `BufferTooSmall` error once the ceiling is reached.
pub fn retrieve_large_response<T, F>(
    policy: &ResponseBufferPolicy,
    mut query: F,
) -> Result<T, NativeError>
where
    F: FnMut(usize) -> Result<T, NativeError>,
{
    let mut nbytes = policy.initial_bytes.clamp(1, policy.max_bytes.max(1));
    loop {
        match query(nbytes) {
            Err(err) if err.kind == NativeErrorKind::BufferTooSmall => {
                if nbytes >= policy.max_bytes {
                    return Err(err);
                }
                nbytes = nbytes.saturating_mul(2).min(policy.max_bytes);
                tracing::warn!(nbytes, "response overflow, increasing buffer");
            }
            other => return other,
        }
    }
}
