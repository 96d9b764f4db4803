use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// One event record within a fetched feed page.
///
/// Feature bodies are forwarded untouched; only the identity used for
/// deduplication is ever read out of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feature(pub Value);

impl Feature {
    /// Publisher-assigned id: top-level `id`, falling back to `properties.id`.
    pub fn id(&self) -> Option<String> {
        let raw = self
            .0
            .get("id")
            .or_else(|| self.0.get("properties").and_then(|p| p.get("id")))?;
        match raw {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Stable deduplication key: the feature id, or a SHA-256 of the JSON body.
    pub fn key(&self) -> String {
        match self.id() {
            Some(id) => id,
            None => {
                let digest = Sha256::digest(self.0.to_string().as_bytes());
                format!("sha256:{:x}", digest)
            }
        }
    }
}

/// Decoded body of a feed page. Only `features` is required; anything else
/// in the document is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}
