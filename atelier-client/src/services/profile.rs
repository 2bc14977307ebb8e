use atelier_model::{ProfileUpdate, Subscription, UserProfile};
use serde::Serialize;

use crate::api_routes::profile;
use crate::errors::ApiResult;
use crate::infrastructure::ApiClient;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest<'a> {
    plan_id: &'a str,
}

/// Profile and subscription management on the user service.
#[derive(Debug, Clone)]
pub struct ProfileService {
    client: ApiClient,
}

impl ProfileService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn me(&self) -> ApiResult<UserProfile> {
        self.client.get(profile::CURRENT).await
    }

    pub async fn update(&self, update: &ProfileUpdate) -> ApiResult<UserProfile> {
        self.client.put(profile::CURRENT, update).await
    }

    /// Current subscription; `None` when the server answers 204.
    pub async fn subscription(&self) -> ApiResult<Option<Subscription>> {
        self.client.get(profile::SUBSCRIPTION).await
    }

    pub async fn subscribe(&self, plan_id: &str) -> ApiResult<Subscription> {
        self.client
            .post(profile::SUBSCRIPTION, &SubscribeRequest { plan_id })
            .await
    }

    pub async fn cancel_subscription(&self) -> ApiResult<()> {
        self.client.delete(profile::SUBSCRIPTION).await
    }
}
