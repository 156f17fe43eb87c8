use std::future::Future;
use smallvec::SmallVec;
use crate::clock::{now, Timestamp};
use crate::err::ServerTimingError;
use crate::interval::{FinishedInterval, PendingInterval};
use crate::options::{ServerTimingOptions, MAX_PRECISION};
use crate::timings::{ServerTimingHeaders, ServerTimings};

/// Records named timing intervals for a single request and renders them as `Server-Timing`.
///
/// One recorder belongs to one request. It is not meant to be shared between concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct ServerTiming {
    finished: SmallVec<[FinishedInterval; 8]>,
    pending: SmallVec<[(String, PendingInterval); 4]>,
    options: ServerTimingOptions,
}

impl ServerTiming {
    pub fn new(options: ServerTimingOptions) -> Self {
        Self{
            finished: SmallVec::new(),
            pending: SmallVec::new(),
            options,
        }
    }

    pub fn options(&self) -> &ServerTimingOptions {
        &self.options
    }

    /// Starts a pending interval, replacing any interval already pending under `name`.
    pub fn start(&mut self, name: &str, description: Option<&str>) {
        let pending = PendingInterval{
            started_at: now(),
            description: description.map(str::to_owned),
        };
        match self.pending.iter_mut().find(|(pending_name, _)| pending_name == name) {
            Some((_, slot)) => {
                tracing::trace!("Restarted pending interval {name}, discarding the previous start");
                *slot = pending;
            },
            None => self.pending.push((name.to_owned(), pending)),
        }
    }

    /// Closes the pending interval `name`, keeping the description it was started with.
    pub fn end(&mut self, name: &str) -> Result<(), ServerTimingError> {
        let ended_at = now();
        if !self.finish_pending(name, ended_at) {
            return Err(ServerTimingError::NoPendingInterval{name: name.to_owned()});
        }
        Ok(())
    }

    /// Appends an interval measured by the caller. The duration is not validated.
    pub fn add(&mut self, name: &str, duration_ms: f64, description: Option<&str>) {
        self.push_finished(FinishedInterval::new(name, duration_ms, description.map(str::to_owned)));
    }

    /// Times `body`. The interval is closed on every exit path, including a panic in `body`.
    pub fn time<T>(&mut self, name: &str, body: impl FnOnce() -> T, description: Option<&str>) -> T {
        let _guard = IntervalGuard::start(self, name, description);
        body()
    }

    /// Times the future produced by `body` until it settles.
    ///
    /// The interval is closed when the future completes, when `body` panics, or when the returned
    /// future is dropped before completion. In the last case the drop instant ends the interval.
    pub async fn time_async<T, F, Fut>(&mut self, name: &str, body: F, description: Option<&str>) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = IntervalGuard::start(self, name, description);
        body().await
    }

    /// Finished intervals in append order, after auto-ending pending ones if configured.
    pub fn entries(&mut self) -> &[FinishedInterval] {
        if self.options.auto_end {
            self.end_all_pending();
        }
        &self.finished
    }

    /// Finished intervals in append order. Pending intervals are left untouched.
    pub fn finished(&self) -> &[FinishedInterval] {
        &self.finished
    }

    pub fn pending_names(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.iter().any(|(pending_name, _)| pending_name == name)
    }

    /// Renders `Server-Timing` and, if configured, `Timing-Allow-Origin`.
    ///
    /// With `auto_end`, every interval still pending is closed at the time of this call first.
    pub fn headers(&mut self) -> ServerTimingHeaders {
        let precision = self.options.precision.min(MAX_PRECISION);
        let mut timings = ServerTimings::new();
        for interval in self.entries() {
            timings.push_interval(interval, precision);
        }
        ServerTimingHeaders{
            server_timing: timings.value,
            timing_allow_origin: self.options.allow_origin.clone().filter(|origin| !origin.is_empty()),
        }
    }

    fn end_all_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let ended_at = now();
        tracing::debug!("Auto-ending {} pending interval(s)", self.pending.len());
        for (name, pending) in self.pending.drain(..) {
            let interval = pending.finish(name, ended_at);
            tracing::trace!("Finished interval {} after {}ms", interval.name, interval.duration_ms);
            self.finished.push(interval);
        }
    }

    fn finish_pending(&mut self, name: &str, ended_at: Timestamp) -> bool {
        let Some(index) = self.pending.iter().position(|(pending_name, _)| pending_name == name) else {
            return false;
        };
        let (name, pending) = self.pending.remove(index);
        self.push_finished(pending.finish(name, ended_at));
        true
    }

    fn push_finished(&mut self, interval: FinishedInterval) {
        tracing::trace!("Finished interval {} after {}ms", interval.name, interval.duration_ms);
        self.finished.push(interval);
    }
}

/// Keeps an interval pending for as long as it is alive.
struct IntervalGuard<'a> {
    recorder: &'a mut ServerTiming,
    name: String,
}

impl<'a> IntervalGuard<'a> {
    fn start(recorder: &'a mut ServerTiming, name: &str, description: Option<&str>) -> Self {
        recorder.start(name, description);
        Self{
            recorder,
            name: name.to_owned(),
        }
    }
}

impl Drop for IntervalGuard<'_> {
    fn drop(&mut self) {
        // the guard holds the only borrow, so nothing can have ended the interval before us
        let ended_at = now();
        self.recorder.finish_pending(&self.name, ended_at);
    }
}
