//! Shared fixtures for the client integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use atelier_client::infrastructure::{ApiClient, TokenRefresher, Transport};
use atelier_client::scanner::ScannerSnapshot;
use atelier_client::session::SessionStore;
use atelier_config::ServiceEndpoints;
use atelier_model::SessionTokens;
use tokio::sync::watch;
use url::Url;

pub fn endpoints() -> ServiceEndpoints {
    let url = |host: &str| Url::parse(&format!("https://{host}.atelier.test/api")).unwrap();
    ServiceEndpoints {
        auth: url("auth"),
        gallery: url("gallery"),
        treasury: url("treasury"),
        user: url("users"),
    }
}

pub fn signed_in(access: &str, refresh: Option<&str>) -> SessionStore {
    SessionStore::with_tokens(SessionTokens::new(access, refresh.map(str::to_string)))
}

pub fn client(
    transport: Arc<dyn Transport>,
    session: SessionStore,
    refresher: Option<Arc<dyn TokenRefresher>>,
) -> ApiClient {
    ApiClient::new(endpoints(), transport, session, refresher)
}

/// Wait until the published snapshot satisfies `predicate`.
pub async fn wait_for(
    rx: &mut watch::Receiver<ScannerSnapshot>,
    predicate: impl Fn(&ScannerSnapshot) -> bool,
) -> ScannerSnapshot {
    let snapshot = tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|s| predicate(s)))
        .await
        .expect("scanner did not reach the expected state in time")
        .expect("scanner controller stopped");
    snapshot.clone()
}
