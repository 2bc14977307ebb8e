//! Relative API paths. The leading segment selects the backend service
//! (see [`atelier_config::ServiceRoute`]).

pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const REFRESH: &str = "/auth/refresh";
    pub const LOGOUT: &str = "/auth/logout";

    pub mod qr {
        pub const APPROVE: &str = "/auth/qr/approve";
    }
}

pub mod gallery {
    pub const COLLECTION: &str = "/gallery";
    pub const ITEM: &str = "/gallery/{id}";
    pub const ARTWORKS: &str = "/gallery/{id}/artworks";
    pub const ARTWORK_ITEM: &str = "/gallery/{id}/artworks/{artwork_id}";
}

pub mod treasury {
    pub const BALANCE: &str = "/treasury/wallet/balance";
    pub const TRANSACTIONS: &str = "/treasury/wallet/transactions";
    pub const WITHDRAWALS: &str = "/treasury/wallet/withdrawals";
}

pub mod profile {
    pub const CURRENT: &str = "/profile/me";
    pub const SUBSCRIPTION: &str = "/profile/me/subscription";
}

/// Substitutes `{name}` placeholders in a route template.
pub fn fill(template: &str, params: &[(&str, &str)]) -> String {
    params
        .iter()
        .fold(template.to_string(), |path, (name, value)| {
            path.replace(&format!("{{{name}}}"), value)
        })
}
