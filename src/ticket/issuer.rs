//! The purchase transaction: reserve, record, sign.

use std::sync::Arc;

use crate::TicketError;
use crate::ticket::inventory::Inventory;
use crate::ticket::record::{IssuedTicket, Purchase, Token};
use crate::ticket::storage::TicketStorage;
use crate::ticket::time_utils::TimeProviderFn;
use crate::ticket::token_codec::TokenCodec;

/// A function that produces fresh record ids.
///
/// Ids must be unique and must not contain the token separator `:`.
pub type IdGeneratorFn = Arc<dyn Fn() -> String + Send + Sync>;

/// The default id generator: random UUID v4 strings.
pub(crate) fn uuid_generator() -> IdGeneratorFn {
    Arc::new(|| uuid::Uuid::new_v4().to_string())
}

/// Turns a purchase request into an issued ticket.
///
/// The storage traits offer no transactions, so the issuer compensates
/// instead: once a unit has been reserved, every later failure releases it
/// again before the error is returned.
///
/// The token value is signed before anything is written, so an unsignable
/// purchase id leaves no records behind. If the token insert or the final
/// purchase update fails, the purchase row stays in the ledger with
/// `token_id == None`. Such a purchase has no token and can never be admitted.
pub struct PurchaseIssuer<S: TicketStorage> {
    storage: Arc<S>,
    inventory: Inventory<S>,
    codec: Arc<TokenCodec>,
    id_generator: IdGeneratorFn,
    time_provider: TimeProviderFn,
}

impl<S: TicketStorage> PurchaseIssuer<S> {
    pub fn new(
        storage: Arc<S>,
        codec: Arc<TokenCodec>,
        id_generator: IdGeneratorFn,
        time_provider: TimeProviderFn,
    ) -> Self {
        Self {
            inventory: Inventory::new(Arc::clone(&storage)),
            storage,
            codec,
            id_generator,
            time_provider,
        }
    }

    /// Buys one unit of `ticket_type_id` for `customer_id`.
    ///
    /// # Errors
    ///
    /// * `OutOfStock` / `NotFound` from the reservation, with no side effects
    /// * `NotFound` when the customer does not exist; the unit is released
    /// * any storage or signing failure; the unit is released
    pub async fn purchase(
        &self,
        customer_id: &str,
        ticket_type_id: &str,
    ) -> Result<IssuedTicket, TicketError> {
        self.inventory.reserve(ticket_type_id).await?;

        match self.record_purchase(customer_id, ticket_type_id).await {
            Ok(issued) => {
                tracing::info!(
                    purchase_id = %issued.purchase.id,
                    ticket_type_id,
                    token_id = %issued.token.id,
                    "ticket issued"
                );
                Ok(issued)
            }
            Err(e) => {
                self.compensate(ticket_type_id, &e).await;
                Err(e)
            }
        }
    }

    async fn record_purchase(
        &self,
        customer_id: &str,
        ticket_type_id: &str,
    ) -> Result<IssuedTicket, TicketError> {
        if !self.storage.customer_exists(customer_id).await? {
            tracing::debug!(customer_id, "purchase for unknown customer");
            return Err(TicketError::NotFound);
        }

        let mut purchase = Purchase::new((self.id_generator)(), customer_id, ticket_type_id);
        let signed_value = self.codec.signed_value(&purchase.id)?;
        let token = Token::new((self.id_generator)(), signed_value, (self.time_provider)()?);

        self.storage.create_purchase(&purchase).await?;
        self.storage.create_token(&token).await?;

        purchase.token_id = Some(token.id.clone());
        self.storage.update_purchase(&purchase).await?;

        Ok(IssuedTicket { purchase, token })
    }

    async fn compensate(&self, ticket_type_id: &str, cause: &TicketError) {
        match self.inventory.release(ticket_type_id).await {
            Ok(_) => tracing::debug!(
                ticket_type_id,
                error = %cause,
                "released reservation after failed purchase"
            ),
            Err(release_err) => tracing::error!(
                ticket_type_id,
                error = %cause,
                release_error = %release_err,
                "failed to release reservation; inventory is short one unit"
            ),
        }
    }

    /// The inventory the issuer reserves from.
    pub fn inventory(&self) -> &Inventory<S> {
        &self.inventory
    }
}
