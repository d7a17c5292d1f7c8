use serde::{Deserialize, Serialize};

/// A single translation request: the raw question plus the tables the
/// target workspace is known to contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub known_tables: Vec<String>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            known_tables: Vec::new(),
        }
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Trimmed, lowercased question text.
    pub fn normalized(&self) -> String {
        self.question.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_builder() {
        let request = QueryRequest::new("  Show ERRORS  ").with_tables(["AppRequests", "Heartbeat"]);

        assert_eq!(request.normalized(), "show errors");
        assert_eq!(request.known_tables, vec!["AppRequests", "Heartbeat"]);
    }

    #[test]
    fn test_query_request_deserializes_without_tables() {
        let request: QueryRequest = serde_json::from_str(r#"{"question":"heartbeat"}"#).unwrap();
        assert!(request.known_tables.is_empty());
    }
}
