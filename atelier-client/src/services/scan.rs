use async_trait::async_trait;
use atelier_model::{ScanApproval, ScanToken};
use serde::Serialize;
use tracing::debug;

use crate::api_routes::auth::qr;
use crate::errors::ApiResult;
use crate::infrastructure::ApiClient;
use crate::scanner::ScanApprover;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApproveRequest<'a> {
    qr_token: &'a str,
}

/// Approves scanned QR tokens with the auth service.
#[derive(Debug, Clone)]
pub struct ScanService {
    client: ApiClient,
}

impl ScanService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScanApprover for ScanService {
    async fn approve(&self, token: &ScanToken) -> ApiResult<ScanApproval> {
        debug!("[ScanService] Approving scanned token");
        self.client
            .post(
                qr::APPROVE,
                &ApproveRequest {
                    qr_token: token.as_str(),
                },
            )
            .await
    }
}
