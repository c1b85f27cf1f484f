//! Connection descriptor and where it gets published.

use crate::orchestrator::Endpoint;
use config::MongoConfig;
use std::fmt;

/// Environment variable downstream test code reads the MongoDB URI from.
pub const CONNECTION_URI_ENV: &str = "MONGO_CONNECTION_URI";

/// Credentialed MongoDB address.
///
/// Renders as `mongodb://<user>:<pass>@<host>:<port>/<db>?authSource=<src>`.
/// `Debug` masks the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub auth_source: String
}

impl ConnectionDescriptor {
    pub fn new(config: &MongoConfig, endpoint: &Endpoint) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            host: endpoint.host.clone(),
            port: endpoint.port,
            database: config.database.clone(),
            auth_source: config.auth_source.clone()
        }
    }

    pub fn uri(&self) -> String {
        self.to_string()
    }

    pub fn redacted(&self) -> String {
        format!(
            "mongodb://{}:****@{}:{}/{}?authSource={}",
            self.username, self.host, self.port, self.database, self.auth_source
        )
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mongodb://{}:{}@{}:{}/{}?authSource={}",
            self.username, self.password, self.host, self.port, self.database, self.auth_source
        )
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionDescriptor")
            .field(&self.redacted())
            .finish()
    }
}

/// Process-wide configuration the descriptor is published into.
pub trait ConfigSink: Send + Sync {
    fn publish(&self, key: &str, value: &str);
}

/// Publishes into the process environment.
pub struct ProcessEnv;

impl ConfigSink for ProcessEnv {
    fn publish(&self, key: &str, value: &str) {
        // SAFETY: the runtime's workers are already up, but the variable is
        // written exactly once, during setup, before any trial is polled, and
        // nothing the harness runs reads it until a trial does.
        unsafe {
            std::env::set_var(key, value);
        }
    }
}
