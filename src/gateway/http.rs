use super::{AssetField, GatewayError, LinkStatusBody, MediaField, RemoteGateway, ResolvedUrl};
use crate::models::{Asset, MediaItem, Profile};
use crate::status::PreferenceStatus;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`RemoteGateway`] over the gallery's JSON API.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// `token` is sent as a bearer credential on every request.
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| GatewayError::Transport(format!("invalid token: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    #[instrument(level = "debug", skip(self, request))]
    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        debug!("{} failed with {}: {}", what, status, message);
        Err(map_status(status, message))
    }

    async fn fetch<T: DeserializeOwned>(&self, what: &str, path: &str) -> Result<T, GatewayError> {
        self.send(what, self.request(Method::GET, path))
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid response: {e}")))
    }

    async fn execute(&self, what: &str, request: RequestBuilder) -> Result<(), GatewayError> {
        self.send(what, request).await.map(|_| ())
    }
}

pub(crate) fn map_status(status: StatusCode, message: String) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => GatewayError::NotFound(message),
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::CONFLICT
        | StatusCode::UNPROCESSABLE_ENTITY => GatewayError::Rejected(message),
        _ => GatewayError::Transport(format!("{status}: {message}")),
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn get_asset(&self, id: &str) -> Result<Asset, GatewayError> {
        self.fetch("get asset", &format!("/assets/{id}")).await
    }

    async fn get_associations(&self, asset_id: &str) -> Result<Vec<MediaItem>, GatewayError> {
        self.fetch("get associations", &format!("/assets/{asset_id}/media"))
            .await
    }

    async fn update_asset_field(&self, id: &str, field: AssetField) -> Result<(), GatewayError> {
        let request = self
            .request(Method::PATCH, &format!("/assets/{id}"))
            .json(&field);
        self.execute("update asset", request).await
    }

    async fn update_media_field(&self, id: &str, field: MediaField) -> Result<(), GatewayError> {
        let request = self
            .request(Method::PATCH, &format!("/media/{id}"))
            .json(&field);
        self.execute("update media", request).await
    }

    async fn update_association_status(
        &self,
        asset_id: &str,
        media_id: &str,
        status: PreferenceStatus,
    ) -> Result<(), GatewayError> {
        let request = self
            .request(
                Method::PUT,
                &format!("/assets/{asset_id}/media/{media_id}/status"),
            )
            .json(&LinkStatusBody { status });
        self.execute("update association", request).await
    }

    async fn delete_asset(&self, id: &str) -> Result<(), GatewayError> {
        let request = self.request(Method::DELETE, &format!("/assets/{id}"));
        self.execute("delete asset", request).await
    }

    async fn delete_media(&self, id: &str) -> Result<(), GatewayError> {
        let request = self.request(Method::DELETE, &format!("/media/{id}"));
        self.execute("delete media", request).await
    }

    async fn resolve_playable_url(&self, locator: &str) -> Result<String, GatewayError> {
        let request = self
            .request(Method::GET, "/media/resolve")
            .query(&[("locator", locator)]);
        let resolved: ResolvedUrl = self
            .send("resolve media", request)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid response: {e}")))?;
        Ok(resolved.url)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, GatewayError> {
        self.fetch("get profile", &format!("/users/{user_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, "gone".into()),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, "no".into()),
            GatewayError::Rejected(_)
        ));
        assert!(matches!(
            map_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
            GatewayError::Transport(_)
        ));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let gateway =
            HttpGateway::new("http://localhost:3000/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(gateway.base_url(), "http://localhost:3000");
    }
}
