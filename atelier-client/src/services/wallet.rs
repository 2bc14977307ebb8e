use atelier_model::{
    ModelError, PageRequest, TransactionPage, WalletBalance, WithdrawalReceipt,
    WithdrawalRequest,
};
use tracing::info;

use crate::api_routes::treasury;
use crate::errors::ApiResult;
use crate::infrastructure::ApiClient;

/// Wallet balance, history and withdrawals on the treasury service.
#[derive(Debug, Clone)]
pub struct WalletService {
    client: ApiClient,
}

impl WalletService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn balance(&self) -> ApiResult<WalletBalance> {
        self.client.get(treasury::BALANCE).await
    }

    pub async fn transactions(&self, page: PageRequest) -> ApiResult<TransactionPage> {
        self.client
            .get_with_query(treasury::TRANSACTIONS, &page.query_pairs())
            .await
    }

    /// Request a withdrawal. Non-positive amounts never reach the server.
    pub async fn withdraw(&self, request: &WithdrawalRequest) -> ApiResult<WithdrawalReceipt> {
        if !request.amount.is_positive() {
            return Err(ModelError::InvalidAmount(request.amount.amount_minor).into());
        }

        info!(
            "[Wallet] Requesting withdrawal of {} via {}",
            request.amount,
            request.method.as_str()
        );
        self.client.post(treasury::WITHDRAWALS, request).await
    }
}
