//! Dissemination of processed activities to local and remote collections.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Error, FanOut, Result};

use super::hs2019::{Hs2019Signer, SignRequest};
use super::machine::Processor;
use super::mailman::Client;
use super::model::{Activity, Iri, Item, ItemCollection};
use super::repo::{KeyLoader, WriteStore};

impl<S, C> Processor<S, C>
where
    S: WriteStore + 'static,
    C: Client + 'static,
{
    /// Append `activity` to local recipients and push it to remote ones.
    ///
    /// Nothing is delivered unless the store can both append to collections
    /// and load signing keys. Local collections are written before any remote
    /// push starts. In async mode remote pushes run as background tasks and
    /// their failures are only logged.
    pub async fn disseminate(
        &self,
        activity: &Activity,
        recipients: &ItemCollection,
    ) -> Result<()> {
        let collections = self.collection_store()?;
        let Some(keys) = self.store.keys() else {
            return Err(Error::Other(anyhow!("store has no key loading capability")));
        };
        let (local, remote): (Vec<Iri>, Vec<Iri>) = recipients
            .iris()
            .into_iter()
            .partition(|iri| self.is_local(iri));

        let mut fan_out = FanOut::new();
        let link = Item::Iri(activity.id().clone());
        for collection in local {
            let outcome = collections.add_to(&collection, &link).await;
            fan_out.record(collection, outcome);
        }
        if !remote.is_empty() {
            match self.signer_for(activity, keys).await {
                Ok(signer) => {
                    let payload = Arc::new(outgoing(activity));
                    if self.async_delivery {
                        self.spawn_delivery(payload, remote, signer);
                    } else {
                        for inbox in remote {
                            let outcome =
                                push(self.client.as_ref(), &inbox, &payload, signer.as_ref())
                                    .await;
                            fan_out.record(inbox, outcome);
                        }
                    }
                }
                Err(error) => {
                    warn!(target: "apub::delivery", id = %activity.id(), %error, "unable to sign deliveries");
                    let message = error.to_string();
                    for inbox in remote {
                        fan_out.record(inbox, Err(Error::Other(anyhow!("{message}"))));
                    }
                }
            }
        }
        debug!(
            target: "apub::delivery",
            id = %activity.id(),
            delivered = fan_out.succeeded(),
            failed = fan_out.failed(),
            "disseminated"
        );
        fan_out.into_result("dissemination")
    }

    async fn signer_for(
        &self,
        activity: &Activity,
        keys: &dyn KeyLoader,
    ) -> Result<Arc<Hs2019Signer>> {
        let Some(actor) = activity.actor_iri() else {
            return Err(Error::not_valid("activity without actor can not be signed"));
        };
        let pkcs8 = keys.load_key(actor).await?;
        Ok(Arc::new(Hs2019Signer::new(actor, &pkcs8)?))
    }

    fn spawn_delivery(&self, payload: Arc<Item>, inboxes: Vec<Iri>, signer: Arc<Hs2019Signer>) {
        let client = self.client.clone();
        let id = payload.link();
        info!(target: "apub::delivery", %id, recipients = inboxes.len(), "background delivery");
        tokio::spawn(async move {
            let mut join_set = JoinSet::new();
            for inbox in inboxes {
                let client = client.clone();
                let payload = payload.clone();
                let signer = signer.clone();
                join_set.spawn(async move {
                    let outcome = push(client.as_ref(), &inbox, &payload, signer.as_ref()).await;
                    (inbox, outcome)
                });
            }
            let mut fan_out = FanOut::new();
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((inbox, outcome)) => fan_out.record(inbox, outcome),
                    Err(error) => warn!(target: "apub::delivery", %id, %error, "delivery task failed"),
                }
            }
            if let Err(error) = fan_out.into_result(format!("delivery of {id}")) {
                warn!(target: "apub::delivery", %error, "background delivery failed");
            }
        });
    }
}

async fn push<C: Client + ?Sized>(
    client: &C,
    inbox: &Iri,
    payload: &Item,
    signer: &Hs2019Signer,
) -> Result<()> {
    let status = client
        .push_to_collection(inbox, payload, Some(signer as &dyn SignRequest))
        .await?;
    debug!(target: "apub::delivery", %inbox, %status, "pushed");
    Ok(())
}

fn outgoing(activity: &Activity) -> Item {
    let mut activity = activity.clone();
    activity.base.bto = ItemCollection::new();
    activity.base.bcc = ItemCollection::new();
    if let Some(object) = activity.object.as_mut().and_then(Item::as_object_mut) {
        object.bto = ItemCollection::new();
        object.bcc = ItemCollection::new();
    }
    Item::from(activity)
}
