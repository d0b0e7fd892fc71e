use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Tier;

/// Authenticated caller: every upload and job is scoped to one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClientIdentity {
    pub client_id: String,
    pub tier: Tier,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>, tier: Tier) -> Self {
        Self {
            client_id: client_id.into(),
            tier,
        }
    }
}
