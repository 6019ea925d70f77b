use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{self, HeaderValue};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::config::DeliveryConfig;
use crate::error::{Error, Result};

use super::hs2019::SignRequest;
use super::model::{Iri, Item};

const APPLICATION_LD_JSON: HeaderValue = HeaderValue::from_static(
    "application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"",
);

/// Remote side of the federation: fetches items and pushes activities.
#[async_trait]
pub trait Client: Send + Sync {
    async fn load_iri(&self, iri: &Iri) -> Result<Item>;
    /// POST `item` to a remote collection, usually an inbox.
    async fn push_to_collection(
        &self,
        collection: &Iri,
        item: &Item,
        signer: Option<&dyn SignRequest>,
    ) -> Result<StatusCode>;
}

/// [`Client`] over reqwest.
#[derive(Clone)]
pub struct Mailman {
    client: reqwest::Client,
}

impl Mailman {
    pub fn new(config: &DeliveryConfig) -> anyhow::Result<Mailman> {
        let client = reqwest::Client::builder()
            .http1_only()
            .user_agent(config.user_agent.as_str())
            .gzip(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("unable to build the http client")?;
        Ok(Mailman { client })
    }
}

fn parse_url(iri: &Iri) -> Result<Url> {
    Url::parse(iri.as_str())
        .map_err(|e| Error::bad_request(format!("{iri} is not a valid url: {e}")))
}

#[async_trait]
impl Client for Mailman {
    async fn load_iri(&self, iri: &Iri) -> Result<Item> {
        let url = parse_url(iri)?;
        debug!(target: "apub::deref", %iri, "GET");
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, APPLICATION_LD_JSON)
            .send()
            .await
            .with_context(|| format!("fetching {iri} failed"))?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(Error::not_found(format!("{iri} is gone")));
            }
            status if !status.is_success() => {
                return Err(Error::Other(anyhow::anyhow!(
                    "fetching {iri} failed with {status}"
                )));
            }
            _ => {}
        }
        let value: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("{iri} did not return json"))?;
        Ok(Item::from_value(value)?)
    }

    async fn push_to_collection(
        &self,
        collection: &Iri,
        item: &Item,
        signer: Option<&dyn SignRequest>,
    ) -> Result<StatusCode> {
        let url = parse_url(collection)?;
        let body = serde_json::to_vec(item).context("unable to encode activity")?;
        let mut request = self
            .client
            .post(url.clone())
            .header(header::CONTENT_TYPE, APPLICATION_LD_JSON);
        if let Some(signer) = signer {
            request = request.headers(signer.sign_post(&url, &body)?);
        }
        let response = request
            .body(body)
            .send()
            .await
            .with_context(|| format!("posting to {collection} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Other(anyhow::anyhow!(
                "posting to {collection} failed with error {status} {text}"
            )));
        }
        Ok(status)
    }
}
