use iamgen_policy::StoreError;
use serde::de::DeserializeOwned;

/// Send an authenticated Google API request and decode the JSON reply.
///
/// Non-success responses keep the provider status with a cleaned message;
/// transport and decode failures become 500s.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    operation: &'static str,
) -> Result<T, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::internal(format!("{} failed: {}", operation, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(operation, status = status.as_u16(), body = %body, "Google API error");
        return Err(StoreError::from_response(status.as_u16(), &body));
    }

    response
        .json()
        .await
        .map_err(|e| StoreError::internal(format!("{} returned invalid JSON: {}", operation, e)))
}
