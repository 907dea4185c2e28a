//! HTTP client for the restaurant collection server.
//!
//! Provides `ApiClient`, the reqwest-backed implementation of both
//! [`RemoteCollection`] (restaurant/review data) and [`AssetFetcher`]
//! (static site assets for the asset worker).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{ApiError, RemoteCollection};
use crate::config::Config;
use crate::models::{NewReview, Restaurant, Review};
use crate::worker::{AssetFetcher, AssetResponse};

/// API client for the restaurant server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url)))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        debug!(url = url, "GET");
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::parse(response, url).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(url = url, method = %method, "Sending JSON body");
        let response = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::parse(response, url).await
    }

    /// Send a request whose response body is not needed.
    async fn send_empty(&self, method: Method, url: &str, query: &[(&str, String)]) -> Result<(), ApiError> {
        debug!(url = url, method = %method, "Sending request");
        let response = self.client.request(method, url).query(query).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

impl RemoteCollection for ApiClient {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, ApiError> {
        self.get(&self.endpoint("restaurants"), &[]).await
    }

    async fn get_restaurant(&self, id: i64) -> Result<Restaurant, ApiError> {
        self.get(&self.endpoint(&format!("restaurants/{}", id)), &[]).await
    }

    async fn list_reviews(&self, restaurant_id: i64) -> Result<Vec<Review>, ApiError> {
        let reviews: Vec<Review> = self
            .get(
                &self.endpoint("reviews/"),
                &[("restaurant_id", restaurant_id.to_string())],
            )
            .await?;

        // One bad record should not hide the rest of the reviews
        Ok(reviews
            .into_iter()
            .filter(|review| match review.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(review_id = review.id, error = %e, "Dropping invalid review from server");
                    false
                }
            })
            .collect())
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review, ApiError> {
        let created: Review = self
            .send_json(Method::POST, &self.endpoint("reviews/"), review)
            .await?;
        created
            .validate()
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(created)
    }

    async fn update_review(&self, review: &Review) -> Result<Review, ApiError> {
        let url = self.endpoint(&format!("reviews/{}", review.id));
        let updated: Review = self.send_json(Method::PUT, &url, review).await?;
        updated
            .validate()
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(updated)
    }

    async fn delete_review(&self, id: i64) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &self.endpoint(&format!("reviews/{}", id)), &[])
            .await
    }

    async fn set_favorite(&self, id: i64, value: bool) -> Result<(), ApiError> {
        self.send_empty(
            Method::PUT,
            &self.endpoint(&format!("restaurants/{}/", id)),
            &[("is_favorite", value.to_string())],
        )
        .await
    }
}

impl AssetFetcher for ApiClient {
    /// Any HTTP status is a response; only transport failures are errors.
    async fn fetch(&self, url: &Url) -> Result<AssetResponse, ApiError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(AssetResponse {
            status,
            content_type,
            body,
        })
    }
}
