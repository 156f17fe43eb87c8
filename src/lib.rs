//! Per-request `Server-Timing` recorder.
//!
//! A handler creates one [`ServerTiming`] per request, records intervals while it works and
//! attaches [`ServerTiming::headers`] to the response.
//!
//! ```
//! use server_timing::{ServerTiming, ServerTimingOptions};
//!
//! let mut timing = ServerTiming::new(ServerTimingOptions::default().with_precision(0));
//! timing.add("cache", 3.0, Some("miss"));
//! let answer = timing.time("compute", || 42, None);
//! assert_eq!(answer, 42);
//! assert!(timing.headers().server_timing.starts_with(r#"cache;dur=3;desc="miss", compute;dur="#));
//! ```

pub mod clock;
mod err;
mod interval;
mod options;
mod recorder;
mod timings;
#[cfg(feature = "actix")]
pub mod actix;

pub use err::ServerTimingError;
pub use interval::{FinishedInterval, IntervalToken};
pub use options::{ServerTimingOptions, DEFAULT_PRECISION, ENV_ALLOW_ORIGIN, ENV_AUTO_END, ENV_PRECISION, MAX_PRECISION};
pub use recorder::ServerTiming;
pub use timings::{ServerTimingHeaders, ServerTimings, SERVER_TIMING, TIMING_ALLOW_ORIGIN};
