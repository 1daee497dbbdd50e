use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// First segment of every topic name, `{prefix}_{recordId}_{field}`.
    pub topic_prefix: String,
    /// Field segment of the catch-all topic.
    pub all_topic_suffix: String,
    /// Upper bound on notification writes running at the same time.
    pub max_parallel_writes: usize,
    /// Key holding the record identifier in raw record documents.
    pub id_field: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            topic_prefix: "record".to_string(),
            all_topic_suffix: "all".to_string(),
            max_parallel_writes: 4,
            id_field: "documentId".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Parses a JSON config document; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DispatchConfig = serde_json::from_str(json)?;
        if config.topic_prefix.is_empty() || config.all_topic_suffix.is_empty() {
            return Err(anyhow::anyhow!("topic_prefix and all_topic_suffix must not be empty"));
        }
        if config.max_parallel_writes == 0 {
            return Err(anyhow::anyhow!("max_parallel_writes must be at least 1"));
        }
        Ok(config)
    }

    pub fn field_topic(&self, record_id: &str, field: &str) -> String {
        format!("{}_{}_{}", self.topic_prefix, record_id, field)
    }

    pub fn all_topic(&self, record_id: &str) -> String {
        self.field_topic(record_id, &self.all_topic_suffix)
    }
}
