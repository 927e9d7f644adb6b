//! Pluggable signature algorithms for admission tokens.
//!
//! The crate ships with HMAC-SHA256, which is what [`TokenCodec`] uses by
//! default. Other keyed MACs can be plugged in by implementing
//! [`SignatureAlgorithm`].
//!
//! [`TokenCodec`]: crate::ticket::TokenCodec

use crate::TicketError;

/// A keyed signature over a message.
///
/// # Implementation Notes
///
/// - `sign` must be deterministic for a given key and message
/// - `verify` must compare in constant time
/// - `verify` must return `false` instead of failing on malformed input
/// - Implementations are shared between tasks and must be `Send + Sync`
///
/// # Example
///
/// ```rust
/// use ticket_gate::ticket::SignatureAlgorithm;
/// use ticket_gate::TicketError;
///
/// struct Reversed;
///
/// impl SignatureAlgorithm for Reversed {
///     fn name(&self) -> &'static str {
///         "reversed"
///     }
///
///     fn sign(&self, message: &[u8]) -> Result<String, TicketError> {
///         Ok(message.iter().rev().map(|b| *b as char).collect())
///     }
///
///     fn verify(&self, message: &[u8], signature: &str) -> bool {
///         self.sign(message).is_ok_and(|s| s == signature)
///     }
/// }
///
/// assert!(Reversed.verify(b"abc", "cba"));
/// ```
pub trait SignatureAlgorithm: Send + Sync {
    /// Short identifier like "hmac-sha256".
    fn name(&self) -> &'static str;

    /// Produce the encoded signature of `message`.
    fn sign(&self, message: &[u8]) -> Result<String, TicketError>;

    /// Check an encoded signature against `message`.
    fn verify(&self, message: &[u8], signature: &str) -> bool;
}

pub mod hmac_sha256 {
    //! HMAC-SHA256 signature algorithm implementation.

    use super::SignatureAlgorithm;
    use crate::TicketError;
    use base64::Engine;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    /// HMAC-SHA256 with standard base64 encoding of the raw digest.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ticket_gate::ticket::signature::hmac_sha256::HmacSha256Algorithm;
    /// use ticket_gate::ticket::SignatureAlgorithm;
    ///
    /// let algorithm = HmacSha256Algorithm::new(b"door-secret")?;
    /// let signature = algorithm.sign(b"purchase-id")?;
    /// assert!(algorithm.verify(b"purchase-id", &signature));
    /// # Ok::<(), ticket_gate::TicketError>(())
    /// ```
    pub struct HmacSha256Algorithm {
        key: Vec<u8>,
    }

    impl HmacSha256Algorithm {
        /// Create a new algorithm instance for `key`.
        ///
        /// Fails with [`TicketError::KeyError`] when the key is empty.
        pub fn new(key: &[u8]) -> Result<Self, TicketError> {
            if key.is_empty() {
                return Err(TicketError::KeyError(
                    "Signing key must not be empty".to_string(),
                ));
            }
            // Reject keys the MAC cannot be keyed with here, not per call.
            Hmac::<Sha256>::new_from_slice(key)
                .map_err(|e| TicketError::KeyError(format!("Invalid HMAC key: {e}")))?;
            Ok(Self { key: key.to_vec() })
        }

        fn create_hmac(&self) -> Result<Hmac<Sha256>, TicketError> {
            Hmac::<Sha256>::new_from_slice(&self.key)
                .map_err(|e| TicketError::KeyError(format!("Invalid HMAC key: {e}")))
        }
    }

    impl SignatureAlgorithm for HmacSha256Algorithm {
        fn name(&self) -> &'static str {
            "hmac-sha256"
        }

        fn sign(&self, message: &[u8]) -> Result<String, TicketError> {
            let mut mac = self.create_hmac()?;
            mac.update(message);
            let signature = mac.finalize().into_bytes();
            Ok(base64::engine::general_purpose::STANDARD.encode(signature))
        }

        fn verify(&self, message: &[u8], signature: &str) -> bool {
            let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature) else {
                return false;
            };
            let Ok(mut mac) = self.create_hmac() else {
                return false;
            };
            mac.update(message);

            // Constant-time comparison
            mac.verify_slice(&provided).is_ok()
        }
    }

}

/// Type alias for the default signature algorithm.
pub type DefaultSignatureAlgorithm = hmac_sha256::HmacSha256Algorithm;

/// Create the default signature algorithm with the given key.
pub fn create_default_algorithm(key: &[u8]) -> Result<DefaultSignatureAlgorithm, TicketError> {
    hmac_sha256::HmacSha256Algorithm::new(key)
}
