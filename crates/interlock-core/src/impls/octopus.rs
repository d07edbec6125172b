//! OctopusClient - HTTP adapter for the deployment platform's REST API.
//!
//! Every request carries the `X-Octopus-ApiKey` header. There is no retry
//! here: a failed call becomes `TransientApi` and the decision channel's
//! redelivery takes care of trying again.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::InterlockConfig;
use crate::domain::{
    DocumentId, InterlockError, InterruptionId, InterruptionRecord, PlatformEvent, SpaceId,
};
use crate::ports::{DeploymentPlatform, SpaceRepository};

const API_KEY_HEADER: &str = "X-Octopus-ApiKey";

/// One page of a platform collection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceCollection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    total_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpaceResource {
    id: String,
}

/// Platform client built once from config.
#[derive(Clone)]
pub struct OctopusClient {
    http: Client,
    base_url: String,
    page_size: u32,
}

impl OctopusClient {
    pub fn new(config: &InterlockConfig) -> Result<Self, InterlockError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose()).map_err(|_| {
            InterlockError::Config("api_key contains characters not allowed in a header".into())
        })?;
        api_key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| InterlockError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            page_size: config.page_size,
        })
    }
}

#[async_trait]
impl DeploymentPlatform for OctopusClient {
    async fn resolve_space(
        &self,
        space_id: &SpaceId,
    ) -> Result<Arc<dyn SpaceRepository>, InterlockError> {
        let url = format!("{}/api/spaces/{}", self.base_url, space_id);
        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(InterlockError::not_found("space", space_id.as_str()));
        }
        let space: SpaceResource = read_json(response).await?;
        debug!(space_id = %space.id, "resolved space");

        Ok(Arc::new(OctopusSpaceRepository {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            space_id: SpaceId::new(space.id),
            page_size: self.page_size,
        }))
    }
}

/// Space-scoped repository (`/api/{spaceId}/...`).
pub struct OctopusSpaceRepository {
    http: Client,
    base_url: String,
    space_id: SpaceId,
    page_size: u32,
}

impl OctopusSpaceRepository {
    fn url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.space_id, path)
    }

    /// Follow `skip`/`take` paging until the collection is exhausted.
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, InterlockError> {
        let url = self.url(path);
        let take = self.page_size.to_string();
        let mut all = Vec::new();
        loop {
            let skip = all.len().to_string();
            let response = self
                .http
                .get(&url)
                .query(query)
                .query(&[("skip", skip.as_str()), ("take", take.as_str())])
                .send()
                .await?;
            let page: ResourceCollection<T> = read_json(response).await?;
            let fetched = page.items.len();
            all.extend(page.items);

            let reached_total = page.total_results.is_some_and(|total| all.len() >= total);
            if fetched == 0 || reached_total {
                return Ok(all);
            }
        }
    }
}

#[async_trait]
impl SpaceRepository for OctopusSpaceRepository {
    fn space_id(&self) -> &SpaceId {
        &self.space_id
    }

    async fn list_events_regarding(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<PlatformEvent>, InterlockError> {
        self.list_all("events", &[("regarding", document_id.as_str())])
            .await
    }

    async fn list_pending_interruptions(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<InterruptionRecord>, InterlockError> {
        self.list_all(
            "interruptions",
            &[("regarding", document_id.as_str()), ("pendingOnly", "true")],
        )
        .await
    }

    async fn get_interruption(
        &self,
        interruption_id: &InterruptionId,
    ) -> Result<InterruptionRecord, InterlockError> {
        let url = self.url(&format!("interruptions/{interruption_id}"));
        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(InterlockError::not_found(
                "interruption",
                interruption_id.as_str(),
            ));
        }
        read_json(response).await
    }

    async fn take_responsibility(
        &self,
        interruption_id: &InterruptionId,
    ) -> Result<(), InterlockError> {
        let url = self.url(&format!("interruptions/{interruption_id}/responsible"));
        let response = self.http.put(&url).send().await?;
        match response.status() {
            StatusCode::CONFLICT | StatusCode::FORBIDDEN => Err(InterlockError::ClaimConflict {
                interruption_id: interruption_id.to_string(),
            }),
            status if status.is_success() => Ok(()),
            _ => Err(api_error(response).await),
        }
    }

    async fn submit(&self, interruption: &InterruptionRecord) -> Result<(), InterlockError> {
        let url = self.url(&format!("interruptions/{}/submit", interruption.id));
        let response = self
            .http
            .post(&url)
            .json(&interruption.form.values)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(api_error(response).await)
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, InterlockError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| InterlockError::TransientApi(format!("failed to decode response: {e}")))
}

async fn api_error(response: Response) -> InterlockError {
    let status = response.status();
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    InterlockError::TransientApi(format!("{status} from {url}: {body}"))
}
