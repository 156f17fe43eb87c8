use std::borrow::Cow;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerTimingError {
    /// `end` was called for a name that has no pending interval.
    NoPendingInterval{name: String},
    /// A rendered header value contains bytes that are not allowed in HTTP headers.
    InvalidHeaderValue{header: &'static str},
    InvalidEnvVar{var: &'static str, value: String},
}
impl ServerTimingError {
    pub fn get_err(&self) -> Cow<'static, str> {
        match self {
            Self::NoPendingInterval{name} => format!("end() was called but there is no pending task '{name}'").into(),
            Self::InvalidHeaderValue{header} => format!("Error: the rendered {header} header value is not a valid HTTP header value").into(),
            Self::InvalidEnvVar{var, value} => format!("Error: environment variable {var} has an invalid value: '{value}'").into(),
        }
    }
}
impl fmt::Display for ServerTimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.get_err().as_ref())
    }
}
impl std::error::Error for ServerTimingError {}
