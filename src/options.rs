use serde_derive::{Deserialize, Serialize};
use crate::err::ServerTimingError;

pub const DEFAULT_PRECISION: usize = 2;
/// Largest accepted precision. Larger values are clamped when rendering.
pub const MAX_PRECISION: usize = 100;

pub const ENV_AUTO_END: &str = "SERVER_TIMING_AUTO_END";
pub const ENV_PRECISION: &str = "SERVER_TIMING_PRECISION";
pub const ENV_ALLOW_ORIGIN: &str = "SERVER_TIMING_ALLOW_ORIGIN";

/// Construction options for a [`crate::ServerTiming`] recorder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerTimingOptions {
    /// Close intervals that are still pending when headers are generated.
    pub auto_end: bool,
    /// Digits after the decimal point of every `dur=` value, at most [`MAX_PRECISION`].
    pub precision: usize,
    /// Value of the `Timing-Allow-Origin` header. Not emitted when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_origin: Option<String>,
}

impl Default for ServerTimingOptions {
    fn default() -> Self {
        Self{
            auto_end: false,
            precision: DEFAULT_PRECISION,
            allow_origin: None,
        }
    }
}

impl ServerTimingOptions {
    pub fn with_auto_end(mut self, auto_end: bool) -> Self {
        self.auto_end = auto_end;
        self
    }
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }
    pub fn with_allow_origin(mut self, allow_origin: impl Into<String>) -> Self {
        self.allow_origin = Some(allow_origin.into());
        self
    }

    /// Reads `SERVER_TIMING_AUTO_END`, `SERVER_TIMING_PRECISION` and `SERVER_TIMING_ALLOW_ORIGIN`.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ServerTimingError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ServerTimingError> {
        let mut options = Self::default();
        if let Some(value) = lookup(ENV_AUTO_END) {
            options.auto_end = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(ServerTimingError::InvalidEnvVar{var: ENV_AUTO_END, value}),
            };
        }
        if let Some(value) = lookup(ENV_PRECISION) {
            options.precision = match value.trim().parse::<usize>() {
                Ok(v) if v <= MAX_PRECISION => v,
                Ok(v) => {
                    tracing::debug!("{ENV_PRECISION}={v} exceeds the maximum of {MAX_PRECISION}");
                    return Err(ServerTimingError::InvalidEnvVar{var: ENV_PRECISION, value});
                },
                Err(err) => {
                    tracing::debug!("Could not parse {ENV_PRECISION}='{value}': {err}");
                    return Err(ServerTimingError::InvalidEnvVar{var: ENV_PRECISION, value});
                }
            };
        }
        options.allow_origin = lookup(ENV_ALLOW_ORIGIN).filter(|v| !v.is_empty());
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars = vars.iter().map(|(k, v)| (*k, v.to_string())).collect::<HashMap<_, _>>();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults() {
        let options = ServerTimingOptions::default();
        assert!(!options.auto_end);
        assert_eq!(options.precision, 2);
        assert_eq!(options.allow_origin, None);
        assert_eq!(ServerTimingOptions::from_lookup(lookup(&[])).unwrap(), options);
    }

    #[test]
    fn reads_all_variables() {
        let options = ServerTimingOptions::from_lookup(lookup(&[
            (ENV_AUTO_END, "TRUE"),
            (ENV_PRECISION, " 0 "),
            (ENV_ALLOW_ORIGIN, "https://example.com"),
        ])).unwrap();
        assert_eq!(options, ServerTimingOptions::default()
            .with_auto_end(true)
            .with_precision(0)
            .with_allow_origin("https://example.com"));
    }

    #[test]
    fn empty_allow_origin_is_unset() {
        let options = ServerTimingOptions::from_lookup(lookup(&[(ENV_ALLOW_ORIGIN, "")])).unwrap();
        assert_eq!(options.allow_origin, None);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = ServerTimingOptions::from_lookup(lookup(&[(ENV_PRECISION, "two")])).unwrap_err();
        assert_eq!(err, ServerTimingError::InvalidEnvVar{var: ENV_PRECISION, value: "two".to_owned()});

        let err = ServerTimingOptions::from_lookup(lookup(&[(ENV_PRECISION, "4000000000")])).unwrap_err();
        assert_eq!(err, ServerTimingError::InvalidEnvVar{var: ENV_PRECISION, value: "4000000000".to_owned()});
        let options = ServerTimingOptions::from_lookup(lookup(&[(ENV_PRECISION, "100")])).unwrap();
        assert_eq!(options.precision, MAX_PRECISION);

        let err = ServerTimingOptions::from_lookup(lookup(&[(ENV_AUTO_END, "maybe")])).unwrap_err();
        assert_eq!(err, ServerTimingError::InvalidEnvVar{var: ENV_AUTO_END, value: "maybe".to_owned()});
    }

    #[test]
    fn deserializes_partial_config() {
        let options: ServerTimingOptions = serde_json::from_str(r#"{"precision": 3}"#).unwrap();
        assert_eq!(options, ServerTimingOptions::default().with_precision(3));
    }
}
