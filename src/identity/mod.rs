/// Federated identity providers
///
/// A provider completes an external OAuth handshake and hands back an
/// already-verified identity. Accounts are matched on email.

pub mod google;

pub use google::GoogleProvider;

use crate::error::WardenResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity supplied by a provider; trusted as verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedIdentity {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start the handshake
    fn authorize_url(&self) -> String;

    /// Exchange the authorization code returned to the callback
    async fn exchange(&self, code: &str) -> WardenResult<FederatedIdentity>;
}
