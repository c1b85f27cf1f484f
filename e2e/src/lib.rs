//! Shared document shapes for the end-to-end suite.

use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

/// A small document round-tripped through the provisioned server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub name: String,
    pub quantity: i32,
    pub tags: Vec<String>
}

impl Widget {
    pub fn new(name: &str, quantity: i32) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            tags: Vec::new()
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Filter matching this widget by name.
    pub fn by_name(&self) -> Document {
        doc! { "name": &self.name }
    }
}
