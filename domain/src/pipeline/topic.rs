//! Routing keys for publish/subscribe delivery

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque routing key. Every message is published to exactly one topic; an
/// agent subscribes to a topic to receive all messages published on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The default topic the whole code pipeline runs on.
    pub fn pipeline() -> Self {
        Self("pipeline".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_equality_and_display() {
        assert_eq!(Topic::pipeline(), Topic::new("pipeline"));
        assert_ne!(Topic::pipeline(), Topic::new("control"));
        assert_eq!(Topic::pipeline().to_string(), "pipeline");
    }
}
