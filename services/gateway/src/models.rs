use market_types::ids::RequestId;
use market_types::status::RequestState;
use serde::{Deserialize, Serialize};

/// Body of a 202 reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub request_id: RequestId,
    pub status: RequestState,
    pub location: String,
}

/// Polling location of a request
pub fn status_location(id: &RequestId) -> String {
    format!("/api/v1/requests/{}", id)
}
