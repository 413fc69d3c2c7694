use super::{send_json, DocumentFetcher, Error};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Content-addressed document gateway. Documents live at `{base}/{cid}`.
#[derive(Debug)]
pub struct IpfsClient {
    client: Client,
    base_url: String,
}

impl IpfsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn document_url(&self, cid: &str) -> String {
        format!("{}/{}", self.base_url, cid)
    }
}

#[async_trait]
impl DocumentFetcher for IpfsClient {
    async fn fetch_document(&self, cid: &str) -> Result<serde_json::Value, Error> {
        let url = self.document_url(cid);
        debug!(%url, "fetching document");
        send_json(self.client.get(url)).await
    }
}
