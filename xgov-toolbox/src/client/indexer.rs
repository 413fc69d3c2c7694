use super::{send_json, Endpoint, Error, RoundLocator};
use crate::round::RoundId;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use snapshot_lib::Address;
use tracing::debug;

const TOKEN_HEADER: &str = "X-Indexer-API-Token";

#[derive(Deserialize)]
struct CreatedApplication {
    id: RoundId,
    #[serde(default)]
    deleted: bool,
}

#[derive(Deserialize)]
struct CreatedApplicationsPage {
    #[serde(default)]
    applications: Vec<CreatedApplication>,
    #[serde(rename = "next-token")]
    next_token: Option<String>,
}

impl CreatedApplicationsPage {
    /// Ids of live applications on this page and the token of the next one.
    fn into_parts(self) -> (Vec<RoundId>, Option<String>) {
        let next = if self.applications.is_empty() {
            None
        } else {
            self.next_token
        };
        let ids = self
            .applications
            .into_iter()
            .filter(|application| !application.deleted)
            .map(|application| application.id)
            .collect::<Vec<_>>();
        (ids, next)
    }
}

/// Indexer REST client.
#[derive(Debug)]
pub struct IndexerClient {
    client: Client,
    endpoint: Endpoint,
}

impl IndexerClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    fn request(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.endpoint.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }
}

#[async_trait]
impl RoundLocator for IndexerClient {
    async fn list_created_rounds(&self, creator: &Address) -> Result<Vec<RoundId>, Error> {
        let url = format!(
            "{}/v2/accounts/{}/created-applications",
            self.endpoint.base_url(),
            creator
        );
        let mut rounds = Vec::new();
        let mut next: Option<String> = None;
        loop {
            let mut request = self.request(self.client.get(&url));
            if let Some(token) = &next {
                request = request.query(&[("next", token)]);
            }
            let page: CreatedApplicationsPage = send_json(request).await?;
            let (ids, token) = page.into_parts();
            debug!(%creator, found = ids.len(), "created applications page");
            rounds.extend(ids);
            match token {
                Some(token) => next = Some(token),
                None => break,
            }
        }
        Ok(rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_skip_deleted_applications() {
        let page: CreatedApplicationsPage = serde_json::from_str(
            r#"{
                "applications": [
                    {"id": 10, "deleted": false, "params": {}},
                    {"id": 11, "deleted": true},
                    {"id": 12}
                ],
                "current-round": 30000000,
                "next-token": "12"
            }"#,
        )
        .unwrap();
        assert_eq!(page.into_parts(), (vec![10, 12], Some("12".to_string())));
    }

    #[test]
    fn empty_page_ends_pagination() {
        let page: CreatedApplicationsPage =
            serde_json::from_str(r#"{"applications": [], "next-token": "99"}"#).unwrap();
        assert_eq!(page.into_parts(), (vec![], None));

        let page: CreatedApplicationsPage =
            serde_json::from_str(r#"{"applications": [{"id": 1}]}"#).unwrap();
        assert_eq!(page.into_parts(), (vec![1], None));
    }
}
