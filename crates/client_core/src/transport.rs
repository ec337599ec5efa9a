use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{CollectionName, ItemId, OrderedSnapshot},
    error::{ApiError, ErrorCode},
    ordering::PermutationMismatch,
    protocol::{
        collection_items_route, collection_reorder_route, ConflictDetails, ReorderRequest,
        ReorderResponse,
    },
};
use std::time::Duration;
use url::Url;

use crate::{
    error::{StoreError, TransportSetupError},
    OrderStore,
};

/// [`OrderStore`] backed by the HTTP API.
#[derive(Debug, Clone)]
pub struct HttpOrderStore {
    http: Client,
    base_url: Url,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl HttpOrderStore {
    pub fn new(server_url: &str) -> Result<Self, TransportSetupError> {
        Self::with_timeout(server_url, REQUEST_TIMEOUT)
    }

    /// Requests that get no complete answer within `timeout` fail as
    /// [`StoreError::Transport`].
    pub fn with_timeout(
        server_url: &str,
        timeout: Duration,
    ) -> Result<Self, TransportSetupError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(http, server_url)?)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(server_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, route: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(route.trim_start_matches('/'))
            .map_err(|err| StoreError::Transport(format!("invalid endpoint '{route}': {err}")))
    }
}

#[async_trait]
impl OrderStore for HttpOrderStore {
    async fn list_ordered(&self, collection: &CollectionName) -> Result<OrderedSnapshot, StoreError> {
        let url = self.endpoint(&collection_items_route(collection))?;
        let res = self.http.get(url).send().await.map_err(transport)?;
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        res.json().await.map_err(transport)
    }

    async fn reassign_ranks(
        &self,
        collection: &CollectionName,
        ordered_ids: &[ItemId],
        expected_version: Option<i64>,
    ) -> Result<i64, StoreError> {
        let url = self.endpoint(&collection_reorder_route(collection))?;
        let res = self
            .http
            .post(url)
            .json(&ReorderRequest {
                ordered_ids: ordered_ids.to_vec(),
                expected_version,
            })
            .send()
            .await
            .map_err(transport)?;
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        let body: ReorderResponse = res.json().await.map_err(transport)?;
        if !body.success {
            return Err(StoreError::Transport(format!(
                "store reported failure: {}",
                body.message
            )));
        }
        Ok(body.version)
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

async fn error_from_response(res: Response) -> StoreError {
    let status = res.status();
    let Ok(body) = res.json::<ApiError>().await else {
        return StoreError::Transport(format!("unexpected response status {status}"));
    };

    match (status, body.code) {
        (StatusCode::BAD_REQUEST, ErrorCode::Validation) => StoreError::Validation {
            mismatch: body
                .details
                .and_then(|details| serde_json::from_value::<PermutationMismatch>(details).ok())
                .unwrap_or_default(),
            message: body.message,
        },
        (StatusCode::CONFLICT, ErrorCode::Conflict) => {
            match body
                .details
                .and_then(|details| serde_json::from_value::<ConflictDetails>(details).ok())
            {
                Some(details) => StoreError::Conflict(details),
                None => StoreError::Transport(format!("{status}: {}", body.message)),
            }
        }
        _ => StoreError::Transport(format!("{status}: {}", body.message)),
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
