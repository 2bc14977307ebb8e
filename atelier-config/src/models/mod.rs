pub mod scanner;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigLoadError;
use scanner::ScannerConfig;

/// Backend service group a request path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceRoute {
    Auth,
    Gallery,
    Treasury,
    User,
}

impl ServiceRoute {
    const PREFIXES: [(&'static str, ServiceRoute); 3] = [
        ("/auth", ServiceRoute::Auth),
        ("/gallery", ServiceRoute::Gallery),
        ("/treasury", ServiceRoute::Treasury),
    ];

    /// Picks the service for a relative request path. Matching works on
    /// whole segments, so `/auth/login` is routed to auth while `/authors`
    /// falls through to the user service.
    pub fn for_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        Self::PREFIXES
            .iter()
            .find(|(prefix, _)| {
                path.strip_prefix(prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .map(|(_, route)| *route)
            .unwrap_or(ServiceRoute::User)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRoute::Auth => "auth",
            ServiceRoute::Gallery => "gallery",
            ServiceRoute::Treasury => "treasury",
            ServiceRoute::User => "user",
        }
    }
}

/// Base URLs for each backend service group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceEndpoints {
    pub auth: Url,
    pub gallery: Url,
    pub treasury: Url,
    pub user: Url,
}

impl ServiceEndpoints {
    pub fn base_for(&self, route: ServiceRoute) -> &Url {
        match route {
            ServiceRoute::Auth => &self.auth,
            ServiceRoute::Gallery => &self.gallery,
            ServiceRoute::Treasury => &self.treasury,
            ServiceRoute::User => &self.user,
        }
    }

    pub fn set(&mut self, route: ServiceRoute, url: Url) {
        match route {
            ServiceRoute::Auth => self.auth = url,
            ServiceRoute::Gallery => self.gallery = url,
            ServiceRoute::Treasury => self.treasury = url,
            ServiceRoute::User => self.user = url,
        }
    }

    /// Points every service group at the same base URL.
    pub fn single(base: Url) -> Self {
        Self {
            auth: base.clone(),
            gallery: base.clone(),
            treasury: base.clone(),
            user: base,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ServiceRoute, &Url)> {
        [
            (ServiceRoute::Auth, &self.auth),
            (ServiceRoute::Gallery, &self.gallery),
            (ServiceRoute::Treasury, &self.treasury),
            (ServiceRoute::User, &self.user),
        ]
        .into_iter()
    }
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        let local = |port: u16| {
            Url::parse(&format!("http://localhost:{port}/api"))
                .unwrap_or_else(|_| unreachable!("static default URL"))
        };
        Self {
            auth: local(8080),
            gallery: local(8081),
            treasury: local(8082),
            user: local(8083),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoints: ServiceEndpoints,
    /// Overall timeout the HTTP transport applies to each request. The
    /// request layer adds no timeout of its own.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    pub scanner: ScannerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: ServiceEndpoints::default(),
            request_timeout_ms: default_request_timeout_ms(),
            scanner: ScannerConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Guard rails applied after every load.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        for (route, url) in self.endpoints.iter() {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigLoadError::UnsupportedScheme {
                    key: format!("endpoints.{}", route.as_str()),
                    scheme: url.scheme().to_string(),
                });
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigLoadError::InvalidValue {
                key: "request_timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        self.scanner.validate()
    }
}
