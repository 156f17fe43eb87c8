use std::fmt::Write;
use crate::interval::FinishedInterval;

pub const SERVER_TIMING: &str = "Server-Timing";
pub const TIMING_ALLOW_ORIGIN: &str = "Timing-Allow-Origin";

/// Builder for a `Server-Timing` header value.
#[non_exhaustive]
#[derive(Debug, Default)]
pub struct ServerTimings {
    pub value: String,
}
impl ServerTimings {
    pub const fn new() -> Self {
        Self {
            value: String::new(),
        }
    }
    pub fn push_interval(&mut self, interval: &FinishedInterval, precision: usize) {
        self.delimit();
        // writing into a String never fails
        let _ = write!(self.value, "{}", interval.token(precision));
    }
    fn delimit(&mut self) {
        if !self.value.is_empty() {
            self.value.push_str(", ");
        }
    }
}

/// Headers rendered by [`crate::ServerTiming::headers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTimingHeaders {
    pub server_timing: String,
    pub timing_allow_origin: Option<String>,
}

impl ServerTimingHeaders {
    /// Looks up a header value by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        if name.eq_ignore_ascii_case(SERVER_TIMING) {
            Some(self.server_timing.as_str())
        } else if name.eq_ignore_ascii_case(TIMING_ALLOW_ORIGIN) {
            self.timing_allow_origin.as_deref()
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        std::iter::once((SERVER_TIMING, self.server_timing.as_str()))
            .chain(self.timing_allow_origin.as_deref().map(|origin| (TIMING_ALLOW_ORIGIN, origin)))
    }
}
