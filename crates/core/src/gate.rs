//! Upload admission: content-type allow-list and size ceiling.

use crate::config::UploadPolicy;
use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;

/// Reason an upload was refused by the gate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("unsupported content type: {mime_type}")]
    UnsupportedType { mime_type: String },

    #[error("upload exceeds maximum size of {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Validates declared content types and byte counts against an [`UploadPolicy`].
///
/// The gate performs no I/O; it only decides.
#[derive(Clone, Debug)]
pub struct Gate {
    policy: UploadPolicy,
}

impl Gate {
    /// Create a gate enforcing the given policy.
    pub fn new(policy: UploadPolicy) -> Self {
        Self { policy }
    }

    /// The policy this gate enforces.
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Maximum accepted size in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.policy.max_size_bytes
    }

    /// Check the declared content type alone, before any bytes are read.
    ///
    /// Parameters (`; charset=...`) and ASCII case are ignored.
    pub fn admit(&self, mime_type: &str) -> Result<(), Rejection> {
        let essence = essence(mime_type);
        let allowed = self
            .policy
            .allowed_mime_types
            .iter()
            .any(|m| m.trim().eq_ignore_ascii_case(essence));
        if allowed {
            Ok(())
        } else {
            Err(Rejection::UnsupportedType {
                mime_type: mime_type.to_string(),
            })
        }
    }

    /// Check a declared content type and a known byte size.
    pub fn validate(&self, mime_type: &str, size_bytes: u64) -> Result<(), Rejection> {
        self.admit(mime_type)?;
        if size_bytes > self.policy.max_size_bytes {
            return Err(Rejection::TooLarge {
                limit: self.policy.max_size_bytes,
            });
        }
        Ok(())
    }

    /// Wrap a byte stream so it fails with [`Rejection::TooLarge`] as soon as
    /// the running total exceeds the limit.
    ///
    /// The chunk that crosses the limit is not yielded and the source is not
    /// polled again, so consumers never see more than `max_size_bytes` bytes.
    pub fn bound<S, E>(&self, stream: S) -> impl Stream<Item = Result<Bytes, E>> + Send + use<S, E>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: From<Rejection> + Send,
    {
        let limit = self.policy.max_size_bytes;
        try_stream! {
            let mut seen: u64 = 0;
            futures::pin_mut!(stream);
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                seen = seen.saturating_add(chunk.len() as u64);
                if seen > limit {
                    Err::<(), _>(Rejection::TooLarge { limit })?;
                }
                yield chunk;
            }
        }
    }
}

/// Strip parameters and whitespace from a content type.
fn essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or_default().trim()
}
