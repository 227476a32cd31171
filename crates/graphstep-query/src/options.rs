use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Query construction options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    /// Always emit `hasLabel` for `of_type`, even when the current element
    /// type already guarantees the target type.
    pub disable_type_optimization: bool,
    /// Label transformation applied to the model when the environment is built
    pub label_casing: LabelCasing,
    /// Include the encoded script in the debug event emitted on execution
    pub log_queries: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelCasing {
    #[default]
    AsDeclared,
    LowerCase,
    CamelCase,
}

impl QueryOptions {
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        serde_json::from_str(json).map_err(QueryError::InvalidOptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let options = QueryOptions::from_json(r#"{ "label_casing": "camel_case" }"#).unwrap();
        assert_eq!(options.label_casing, LabelCasing::CamelCase);
        assert!(!options.disable_type_optimization);
        assert!(!options.log_queries);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = QueryOptions::from_json(r#"{ "label_case": "camel_case" }"#).unwrap_err();
        assert!(matches!(err, QueryError::InvalidOptions(_)));
    }
}
