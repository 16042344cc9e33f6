use crate::{
    api::{ApiClient, ApiError},
    services::types::Statistics,
};

/// Inbox and link counters for the current user.
pub async fn get(client: &ApiClient) -> Result<Statistics, ApiError> {
    client.get("/core/statistics/").await
}
