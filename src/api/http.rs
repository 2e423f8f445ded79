use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{decode_activities, ActivityApi, FetchRequest};
use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::models::Activity;

/// `ActivityApi` over HTTP.
#[derive(Clone)]
pub struct HttpActivityApi {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpActivityApi {
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/activities/map", self.base_url)
    }
}

#[async_trait]
impl ActivityApi for HttpActivityApi {
    async fn fetch_activities(&self, request: &FetchRequest) -> AppResult<Vec<Activity>> {
        let mut builder = self.http.get(self.endpoint()).query(&request.query_params());
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Activity fetch failed with HTTP {}", status);
            return Err(AppError::Api(format!("HTTP {}: {}", status, body)));
        }

        let body = response.bytes().await?;
        let activities = decode_activities(&body)?;
        debug!("Fetched {} activities", activities.len());
        Ok(activities)
    }
}
