//! Readiness probes.

use async_trait::async_trait;
use errors::HarnessError;
use mongodb::Client;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, ReadPreference, SelectionCriteria};
use std::time::Duration;

/// A single liveness check against the provisioned service.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn probe(&self, uri: &str) -> Result<(), HarnessError>;
}

/// Pings the MongoDB primary over a fresh, short-lived client.
pub struct MongoProbe {
    attempt_timeout: Duration
}

impl MongoProbe {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self { attempt_timeout }
    }
}

#[async_trait]
impl ReadinessProbe for MongoProbe {
    async fn probe(&self, uri: &str) -> Result<(), HarnessError> {
        let failed = |e: mongodb::error::Error| HarnessError::ProbeFailed {
            reason: e.to_string()
        };

        let mut options = ClientOptions::parse(uri).await.map_err(failed)?;
        options.app_name = Some("e2e-readiness".to_string());
        options.connect_timeout = Some(self.attempt_timeout);
        options.server_selection_timeout = Some(self.attempt_timeout);

        let client = Client::with_options(options).map_err(failed)?;
        let result = client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
            .await;
        client.shutdown().await;

        result.map(|_| ()).map_err(failed)
    }
}
