use anyhow::{Context, Result};
use serde::Deserialize;

use crate::activity_pub::model::Iri;

#[derive(Clone, Default, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub activity_pub: ActivityPubConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Clone, Default, Debug, Deserialize)]
#[serde(default)]
pub struct ActivityPubConfig {
    /// Base IRI of this instance, e.g. `https://social.example.com`
    pub base_url: String,
    /// Other base IRIs this instance answers for
    pub aliases: Vec<String>,
    /// Instance wide shared inbox, receives public addressed activities
    pub shared_inbox: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Push to each remote recipient as an independent task
    #[serde(rename = "async")]
    pub async_delivery: bool,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            async_delivery: false,
            timeout_secs: 10,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(input: &str) -> Result<Config> {
        toml::from_str(input).context("unable to parse configuration")
    }
}

impl ActivityPubConfig {
    pub fn locality(&self) -> Locality {
        let mut bases = vec![self.base_url.clone()];
        bases.extend(self.aliases.iter().cloned());
        Locality::new(bases)
    }
    pub fn shared_inbox(&self) -> Option<Iri> {
        self.shared_inbox.as_deref().map(Iri::from)
    }
}

/// The set of base IRIs owned by this instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Locality {
    bases: Vec<String>,
}

impl Locality {
    pub fn new(bases: impl IntoIterator<Item = String>) -> Locality {
        let bases = bases
            .into_iter()
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty())
            .collect();
        Locality { bases }
    }
    pub fn is_local(&self, iri: &Iri) -> bool {
        let iri = iri.as_str();
        self.bases.iter().any(|base| {
            iri.strip_prefix(base.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '#', '?']))
        })
    }
}
