//! Token verification and invalidation at the door.

use std::sync::Arc;

use crate::TicketError;
use crate::ticket::record::{Admission, Token};
use crate::ticket::storage::TicketStorage;
use crate::ticket::time_utils::TimeProviderFn;
use crate::ticket::token_codec::TokenCodec;

/// Checks presented token strings and retires used tokens.
///
/// Verification and invalidation are separate steps. `verify` only answers
/// whether the token is authentic and which purchase it belongs to; the
/// caller decides whether to admit (see [`Admission::is_active`]) and then
/// calls `invalidate`.
///
/// Every rejection is either `InvalidToken` or `NotFound`. Show operators
/// [`TicketError::public_message`] rather than the variant.
pub struct VerificationGate<S: TicketStorage> {
    storage: Arc<S>,
    codec: Arc<TokenCodec>,
    time_provider: TimeProviderFn,
}

impl<S: TicketStorage> VerificationGate<S> {
    pub fn new(storage: Arc<S>, codec: Arc<TokenCodec>, time_provider: TimeProviderFn) -> Self {
        Self {
            storage,
            codec,
            time_provider,
        }
    }

    /// Authenticates `token` and resolves it to its purchase.
    ///
    /// # Errors
    ///
    /// * `InvalidToken` - malformed token, bad signature, or the purchase's
    ///   ticket type or customer no longer exists
    /// * `NotFound` - no purchase with the embedded id
    pub async fn verify(&self, token: &str) -> Result<Admission, TicketError> {
        let (purchase_id, mac) = TokenCodec::parse(token).inspect_err(|_| {
            tracing::debug!("rejected malformed token");
        })?;

        let Some(purchase) = self.storage.get_purchase(purchase_id).await? else {
            tracing::debug!(purchase_id, "rejected token for unknown purchase");
            return Err(TicketError::NotFound);
        };

        if !self.storage.ticket_type_exists(&purchase.ticket_type_id).await?
            || !self.storage.customer_exists(&purchase.customer_id).await?
        {
            tracing::debug!(purchase_id, "rejected token for orphaned purchase");
            return Err(TicketError::InvalidToken);
        }

        if !self.codec.verify(purchase_id, mac) {
            tracing::debug!(purchase_id, "rejected token with bad signature");
            return Err(TicketError::InvalidToken);
        }

        let token = match purchase.token_id.as_deref() {
            Some(token_id) => self.storage.get_token(token_id).await?,
            None => None,
        };

        tracing::debug!(
            purchase_id,
            active = token.as_ref().is_some_and(|t| t.active),
            "token verified"
        );
        Ok(Admission { purchase, token })
    }

    /// Marks a token as used.
    ///
    /// Idempotent: an already inactive token is returned unchanged, with its
    /// original `updated_at`.
    pub async fn invalidate(&self, token_id: &str) -> Result<Token, TicketError> {
        self.invalidate_tracked(token_id)
            .await
            .map(|(token, _)| token)
    }

    /// Like [`invalidate`](Self::invalidate), also reporting whether this
    /// call flipped the token.
    pub(crate) async fn invalidate_tracked(
        &self,
        token_id: &str,
    ) -> Result<(Token, bool), TicketError> {
        let mut token = self
            .storage
            .get_token(token_id)
            .await?
            .ok_or(TicketError::NotFound)?;

        if !token.active {
            tracing::debug!(token_id, "token already inactive");
            return Ok((token, false));
        }

        token.active = false;
        token.updated_at = (self.time_provider)()?;
        self.storage.update_token(&token).await?;

        tracing::debug!(token_id, updated_at = token.updated_at, "token invalidated");
        Ok((token, true))
    }
}
