//! Brokerage account linking through a financial-data aggregator.
//!
//! The aggregator sits behind [`FinancialLink`], the same way market data
//! sits behind [`crate::market::MarketData`]. [`plaid::PlaidClient`] is the
//! production implementation. Access tokens obtained from an exchange are
//! stored per user and institution and never returned to clients.

pub mod memory;
pub mod plaid;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::auth::Platform;
use crate::models::linking::{
    ExchangedItem, Holding, Institution, InstitutionHoldings, LinkToken, LinkedItem,
    LinkedItemSummary,
};
use crate::store::{StoreFailure, bounded, is_transient_db_error, read_with_retry};

pub use memory::MemoryLinkedItemStore;
pub use plaid::PlaidClient;

/// Aggregator call errors.
#[derive(Debug, Error)]
pub enum FinancialLinkError {
    #[error("Financial link provider not configured")]
    NotConfigured,

    #[error("Financial link request failed: {0}")]
    Request(String),

    #[error("Financial link provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Financial link response parse error: {0}")]
    Decode(String),

    #[error("Financial link request timed out")]
    Timeout,
}

/// Outbound aggregator calls.
#[async_trait]
pub trait FinancialLink: Send + Sync {
    /// Link token for `user_id`, scoped to investment data.
    async fn create_link_token(&self, user_id: &str) -> Result<LinkToken, FinancialLinkError>;

    /// Sandbox-only shortcut that skips the Link UI and returns a public
    /// token for `institution_id`.
    async fn sandbox_public_token(
        &self,
        institution_id: &str,
        initial_products: &[String],
    ) -> Result<String, FinancialLinkError>;

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<ExchangedItem, FinancialLinkError>;

    async fn holdings(&self, access_token: &str) -> Result<Vec<Holding>, FinancialLinkError>;
}

/// Stand-in used when no aggregator credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unconfigured;

#[async_trait]
impl FinancialLink for Unconfigured {
    async fn create_link_token(&self, _user_id: &str) -> Result<LinkToken, FinancialLinkError> {
        Err(FinancialLinkError::NotConfigured)
    }

    async fn sandbox_public_token(
        &self,
        _institution_id: &str,
        _initial_products: &[String],
    ) -> Result<String, FinancialLinkError> {
        Err(FinancialLinkError::NotConfigured)
    }

    async fn exchange_public_token(
        &self,
        _public_token: &str,
    ) -> Result<ExchangedItem, FinancialLinkError> {
        Err(FinancialLinkError::NotConfigured)
    }

    async fn holdings(&self, _access_token: &str) -> Result<Vec<Holding>, FinancialLinkError> {
        Err(FinancialLinkError::NotConfigured)
    }
}

/// Linking service errors.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error(transparent)]
    Provider(#[from] FinancialLinkError),
}

impl StoreFailure for LinkError {
    fn timed_out(op: &'static str) -> Self {
        LinkError::Unavailable(format!("{op} timed out"))
    }

    fn is_retryable(&self) -> bool {
        match self {
            LinkError::Unavailable(_) => true,
            LinkError::DbError(e) => is_transient_db_error(e),
            _ => false,
        }
    }
}

/// Persistence for linked items.
#[async_trait]
pub trait LinkedItemStore: Send + Sync {
    /// Insert or replace the user's connection to `institution`.
    async fn upsert(
        &self,
        user_id: &str,
        exchanged: &ExchangedItem,
        institution: &Institution,
    ) -> Result<LinkedItem, LinkError>;

    /// All connections of a user, oldest first.
    async fn list(&self, user_id: &str) -> Result<Vec<LinkedItem>, LinkError>;

    async fn remove_all(&self, user_id: &str) -> Result<u64, LinkError>;
}

/// Failure text reported for an institution whose holdings could not be read.
pub const HOLDINGS_FAILURE: &str = "Unable to fetch holdings";

/// Account linking over an aggregator and a linked-item store.
#[derive(Clone)]
pub struct FinancialLinks {
    link: Arc<dyn FinancialLink>,
    store: Arc<dyn LinkedItemStore>,
    store_timeout: Duration,
    read_retries: u32,
}

impl std::fmt::Debug for FinancialLinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinancialLinks")
            .field("store_timeout", &self.store_timeout)
            .field("read_retries", &self.read_retries)
            .finish_non_exhaustive()
    }
}

impl FinancialLinks {
    pub fn new(
        link: Arc<dyn FinancialLink>,
        store: Arc<dyn LinkedItemStore>,
        store_timeout: Duration,
        read_retries: u32,
    ) -> Self {
        Self {
            link,
            store,
            store_timeout,
            read_retries,
        }
    }

    /// Link token for the native iOS Link SDK.
    pub async fn create_link_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<LinkToken, LinkError> {
        if platform != Platform::Ios {
            return Err(LinkError::ValidationError(
                "This endpoint is for iOS clients only".into(),
            ));
        }
        let token = self.link.create_link_token(user_id).await?;
        info!(%user_id, "link token created");
        Ok(token)
    }

    pub async fn sandbox_public_token(
        &self,
        institution_id: &str,
        initial_products: &[String],
    ) -> Result<String, LinkError> {
        if institution_id.trim().is_empty() || initial_products.is_empty() {
            return Err(LinkError::ValidationError(
                "Institution ID and initial products are required".into(),
            ));
        }
        Ok(self
            .link
            .sandbox_public_token(institution_id.trim(), initial_products)
            .await?)
    }

    /// Exchange a public token from Link and remember the connection.
    pub async fn exchange_public_token(
        &self,
        user_id: &str,
        public_token: &str,
        institution: Option<&Institution>,
    ) -> Result<LinkedItemSummary, LinkError> {
        let institution = institution
            .filter(|i| !i.institution_id.is_empty() && !i.name.is_empty())
            .filter(|_| !public_token.is_empty())
            .ok_or_else(|| {
                LinkError::ValidationError(
                    "Public token and institution information are required".into(),
                )
            })?;

        let exchanged = self.link.exchange_public_token(public_token).await?;
        let item = bounded(
            "upsert_linked_item",
            self.store_timeout,
            self.store.upsert(user_id, &exchanged, institution),
        )
        .await?;
        info!(
            %user_id,
            item_id = %item.item_id,
            institution = %item.institution_id,
            "account linked"
        );
        Ok(LinkedItemSummary::from(&item))
    }

    /// Holdings of every linked institution, fetched concurrently. One
    /// institution failing does not fail the others.
    pub async fn holdings(&self, user_id: &str) -> Result<Vec<InstitutionHoldings>, LinkError> {
        let items = read_with_retry(
            "list_linked_items",
            self.store_timeout,
            self.read_retries,
            || self.store.list(user_id),
        )
        .await?;
        if items.is_empty() {
            return Err(LinkError::NotFound("No connected accounts found".into()));
        }

        Ok(join_all(items.into_iter().map(|item| {
            let link = self.link.clone();
            async move {
                match link.holdings(&item.access_token).await {
                    Ok(holdings) => InstitutionHoldings {
                        institution: item.institution_name,
                        holdings,
                        error: None,
                    },
                    Err(e) => {
                        warn!(item_id = %item.item_id, error = %e, "holdings fetch failed");
                        InstitutionHoldings {
                            institution: item.institution_name,
                            holdings: Vec::new(),
                            error: Some(HOLDINGS_FAILURE.to_string()),
                        }
                    }
                }
            }
        }))
        .await)
    }

    pub async fn remove_all(&self, user_id: &str) -> Result<u64, LinkError> {
        bounded(
            "remove_linked_items",
            self.store_timeout,
            self.store.remove_all(user_id),
        )
        .await
    }
}
