//! Token wire format: `"<purchase_id>:<signature>"`.

use crate::TicketError;
use crate::ticket::signature::{SignatureAlgorithm, create_default_algorithm};

/// Separator between the purchase id and its signature.
///
/// Purchase ids must never contain it; UUIDs don't.
pub const TOKEN_SEPARATOR: char = ':';

/// Signs purchase ids and parses presented tokens.
///
/// The codec holds no state besides the signing key, so one instance is
/// shared by the issuer and the gate.
///
/// # Example
///
/// ```rust
/// use ticket_gate::ticket::TokenCodec;
///
/// let codec = TokenCodec::new(b"door-secret")?;
/// let token = codec.signed_value("8d0c5b1e-purchase")?;
///
/// let (purchase_id, mac) = TokenCodec::parse(&token)?;
/// assert_eq!(purchase_id, "8d0c5b1e-purchase");
/// assert!(codec.verify(purchase_id, mac));
/// # Ok::<(), ticket_gate::TicketError>(())
/// ```
pub struct TokenCodec {
    algorithm: Box<dyn SignatureAlgorithm>,
}

impl TokenCodec {
    /// Create a codec using HMAC-SHA256 keyed with `secret`.
    ///
    /// An empty secret is a [`TicketError::KeyError`].
    pub fn new(secret: &[u8]) -> Result<Self, TicketError> {
        Ok(Self::with_algorithm(create_default_algorithm(secret)?))
    }

    /// Create a codec around a custom signature algorithm.
    pub fn with_algorithm<A: SignatureAlgorithm + 'static>(algorithm: A) -> Self {
        Self {
            algorithm: Box::new(algorithm),
        }
    }

    /// Name of the underlying algorithm.
    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// Computes the MAC of `purchase_id`.
    pub fn sign(&self, purchase_id: &str) -> Result<String, TicketError> {
        self.algorithm.sign(purchase_id.as_bytes())
    }

    /// Checks `mac` against `purchase_id`. Never fails, only answers.
    pub fn verify(&self, purchase_id: &str, mac: &str) -> bool {
        self.algorithm.verify(purchase_id.as_bytes(), mac)
    }

    /// Builds the full token string for `purchase_id`.
    pub fn signed_value(&self, purchase_id: &str) -> Result<String, TicketError> {
        if purchase_id.is_empty() || purchase_id.contains(TOKEN_SEPARATOR) {
            return Err(TicketError::InvalidToken);
        }
        let mac = self.sign(purchase_id)?;
        Ok(format!("{purchase_id}{TOKEN_SEPARATOR}{mac}"))
    }

    /// Splits a presented token into `(purchase_id, mac)`.
    ///
    /// Exactly two non-empty parts are required.
    pub fn parse(token: &str) -> Result<(&str, &str), TicketError> {
        let mut parts = token.split(TOKEN_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(purchase_id), Some(mac), None) if !purchase_id.is_empty() && !mac.is_empty() => {
                Ok((purchase_id, mac))
            }
            _ => Err(TicketError::InvalidToken),
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm.name())
            .finish_non_exhaustive()
    }
}
