use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

pub const DEFAULT_ENV: &str = "prod";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(30_000);

/// Kind of a flag, used as the `type` tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Boolean,
    Percentage,
    Set,
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagKind::Boolean => write!(f, "boolean"),
            FlagKind::Percentage => write!(f, "percentage"),
            FlagKind::Set => write!(f, "set"),
        }
    }
}

/// Value of a flag as served by the API.
///
/// Serialized as `{"type": "boolean", "boolean": true}`, the payload living
/// under a field named after the tag. When decoding, a missing `type` is
/// inferred from whichever payload field is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "lowercase",
    try_from = "RawFlagValue"
)]
pub enum FlagValue {
    Boolean { boolean: bool },
    /// Intended to be in the 0-100 range, not enforced.
    Percentage { percentage: f64 },
    Set { set: Vec<String> },
}

impl FlagValue {
    pub fn boolean(value: bool) -> Self {
        FlagValue::Boolean { boolean: value }
    }

    pub fn percentage(value: f64) -> Self {
        FlagValue::Percentage { percentage: value }
    }

    pub fn set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FlagValue::Set {
            set: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> FlagKind {
        match self {
            FlagValue::Boolean { .. } => FlagKind::Boolean,
            FlagValue::Percentage { .. } => FlagKind::Percentage,
            FlagValue::Set { .. } => FlagKind::Set,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Boolean { boolean } => Some(*boolean),
            _ => None,
        }
    }

    pub fn as_percentage(&self) -> Option<f64> {
        match self {
            FlagValue::Percentage { percentage } => Some(*percentage),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[String]> {
        match self {
            FlagValue::Set { set } => Some(set),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct RawFlagValue {
    #[serde(rename = "type")]
    kind: Option<FlagKind>,
    boolean: Option<bool>,
    percentage: Option<f64>,
    set: Option<Vec<String>>,
}

impl TryFrom<RawFlagValue> for FlagValue {
    type Error = String;

    fn try_from(raw: RawFlagValue) -> Result<Self, Self::Error> {
        let kind = match raw.kind {
            Some(kind) => kind,
            None if raw.boolean.is_some() => FlagKind::Boolean,
            None if raw.percentage.is_some() => FlagKind::Percentage,
            None if raw.set.is_some() => FlagKind::Set,
            None => return Err("flag value has no type and no payload".to_string()),
        };

        let missing = || format!("flag value of type {} is missing its `{}` field", kind, kind);
        match kind {
            FlagKind::Boolean => raw.boolean.map(FlagValue::boolean).ok_or_else(missing),
            FlagKind::Percentage => raw
                .percentage
                .map(FlagValue::percentage)
                .ok_or_else(missing),
            FlagKind::Set => raw
                .set
                .map(|set| FlagValue::Set { set })
                .ok_or_else(missing),
        }
    }
}

/// A single entry of the `/flags` response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlagRecord {
    pub key: String,
    pub value: FlagValue,
}

impl FlagRecord {
    pub fn new(key: impl Into<String>, value: FlagValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Invoked after every successful cache replacement.
pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;
/// Invoked when a fetch cycle fails.
pub type ErrorCallback = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Options to use when creating the client, they will override default values, if they exist.
///
/// The default value for api_url is https://api.flaglite.co
/// The default value for env is "prod"
/// The default value for refresh_interval is 30s, `Duration::ZERO` disables polling
#[derive(Clone)]
pub struct FlagLiteOptions {
    pub project_public_id: String,
    pub api_key: String,
    pub api_url: Option<String>,
    pub env: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub on_update: Option<UpdateCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl FlagLiteOptions {
    pub fn new(project_public_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_public_id: project_public_id.into(),
            api_key: api_key.into(),
            api_url: None,
            env: None,
            refresh_interval: None,
            on_update: None,
            on_error: None,
        }
    }

    /// Options for a client that fetches once and never polls.
    pub fn polling_disabled(
        project_public_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            refresh_interval: Some(Duration::ZERO),
            ..Self::new(project_public_id, api_key)
        }
    }

    pub fn with_on_update(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    pub fn with_on_error(mut self, f: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn refresh_interval(&self) -> Duration {
        self.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_tagged_values() {
        let records: Vec<FlagRecord> = serde_json::from_value(json!([
            {"key": "beta-ui", "value": {"type": "boolean", "boolean": true}},
            {"key": "rollout", "value": {"type": "percentage", "percentage": 25}},
            {"key": "regions", "value": {"type": "set", "set": ["eu", "us"]}},
        ]))
        .expect("should parse records");

        assert_eq!(
            records,
            vec![
                FlagRecord::new("beta-ui", FlagValue::boolean(true)),
                FlagRecord::new("rollout", FlagValue::percentage(25.0)),
                FlagRecord::new("regions", FlagValue::set(["eu", "us"])),
            ]
        );
    }

    #[test]
    fn test_deserialize_infers_missing_type() {
        let value: FlagValue =
            serde_json::from_value(json!({"percentage": 12.5})).expect("should parse");
        assert_eq!(value, FlagValue::percentage(12.5));

        let value: FlagValue =
            serde_json::from_value(json!({"boolean": false})).expect("should parse");
        assert_eq!(value.kind(), FlagKind::Boolean);
    }

    #[test]
    fn test_deserialize_rejects_missing_payload() {
        assert!(serde_json::from_value::<FlagValue>(json!({"type": "set"})).is_err());
        assert!(serde_json::from_value::<FlagValue>(json!({})).is_err());
        assert!(serde_json::from_value::<FlagValue>(json!({"type": "number", "number": 1})).is_err());
    }

    #[test]
    fn test_serialize_uses_type_tag() {
        let value = serde_json::to_value(FlagValue::set(["a"])).expect("should serialize");
        assert_eq!(value, json!({"type": "set", "set": ["a"]}));
    }

    #[test]
    fn test_typed_views() {
        let value = FlagValue::percentage(40.0);
        assert_eq!(value.as_percentage(), Some(40.0));
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.as_set(), None);
        assert_eq!(FlagValue::set(["x"]).as_set(), Some(&["x".to_string()][..]));
    }

    #[test]
    fn test_options_defaults() {
        let options = FlagLiteOptions::new("abc", "key");
        assert_eq!(options.refresh_interval(), DEFAULT_REFRESH_INTERVAL);
        assert!(options.api_url.is_none());
        assert!(options.env.is_none());

        let options = FlagLiteOptions::polling_disabled("abc", "key");
        assert_eq!(options.refresh_interval(), Duration::ZERO);
    }
}
