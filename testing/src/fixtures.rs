use crate::descriptor::CONNECTION_URI_ENV;
use anyhow::Context;
use mongodb::Client;
use std::sync::atomic::{AtomicU32, Ordering};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

/// Collection name no other test in this process will use.
pub fn unique_collection(prefix: &str) -> String {
    unique_id(prefix).replace('-', "_")
}

/// The URI published by the harness during setup.
pub fn connection_uri() -> anyhow::Result<String> {
    std::env::var(CONNECTION_URI_ENV)
        .with_context(|| format!("{} is not set; is the test harness running?", CONNECTION_URI_ENV))
}

/// A client for the harness-provisioned MongoDB.
pub async fn mongo_client() -> anyhow::Result<Client> {
    let uri = connection_uri()?;
    Client::with_uri_str(&uri)
        .await
        .context("Failed to create MongoDB client")
}
