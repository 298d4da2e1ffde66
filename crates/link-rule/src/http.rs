use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{Rule, RulePayload};
use crate::storage::RuleStore;

/// 通过后端 REST 接口读写规则
///
/// - `GET    {base}/links/{link}/rules`
/// - `POST   {base}/links/{link}/rules`
/// - `PATCH  {base}/links/{link}/rules/{rule}`
/// - `DELETE {base}/links/{link}/rules/{rule}`
pub struct HttpRuleStore {
    base_url: Url,
    api_token: Option<String>,
    client: Client,
}

/// 列表接口可能直接返回数组，也可能包一层 `rules`
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(Vec<Rule>),
    Wrapped { rules: Vec<Rule> },
}

impl HttpRuleStore {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow!("Invalid rule store base url {}: {}", base_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Rule store base url cannot be a base: {}", base_url).into());
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_token,
            client,
        })
    }

    fn url(&self, link_id: &str, rule_id: Option<&str>) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Rule store base url cannot be a base"))?;
            segments.pop_if_empty().extend(["links", link_id, "rules"]);
            if let Some(rule_id) = rule_id {
                segments.push(rule_id);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response, link_id: &str, rule_id: Option<&str>) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let (StatusCode::NOT_FOUND, Some(rule_id)) = (status, rule_id) {
            return Err(StoreError::NotFound {
                link_id: link_id.to_string(),
                rule_id: rule_id.to_string(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RuleStore for HttpRuleStore {
    async fn create(&self, link_id: &str, rule: &RulePayload) -> Result<Rule, StoreError> {
        let url = self.url(link_id, None)?;
        debug!(link_id = %link_id, url = %url, "Creating rule");

        let response = self.request(Method::POST, url).json(rule).send().await?;
        let response = Self::check(response, link_id, None).await?;
        Ok(response.json().await?)
    }

    async fn update(&self, link_id: &str, rule_id: &str, patch: &RulePayload) -> Result<Rule, StoreError> {
        let url = self.url(link_id, Some(rule_id))?;
        debug!(link_id = %link_id, rule_id = %rule_id, "Updating rule");

        let response = self.request(Method::PATCH, url).json(patch).send().await?;
        let response = Self::check(response, link_id, Some(rule_id)).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, link_id: &str, rule_id: &str) -> Result<(), StoreError> {
        let url = self.url(link_id, Some(rule_id))?;
        debug!(link_id = %link_id, rule_id = %rule_id, "Deleting rule");

        let response = self.request(Method::DELETE, url).send().await?;
        Self::check(response, link_id, Some(rule_id)).await?;
        Ok(())
    }

    async fn list(&self, link_id: &str) -> Result<Vec<Rule>, StoreError> {
        let url = self.url(link_id, None)?;

        let response = self.request(Method::GET, url).send().await?;
        let response = Self::check(response, link_id, None).await?;
        let bytes = response.bytes().await?;
        let rules = match serde_json::from_slice::<ListBody>(&bytes)? {
            ListBody::Bare(rules) | ListBody::Wrapped { rules } => rules,
        };
        Ok(rules)
    }

    fn store_type(&self) -> &str {
        "http"
    }
}
