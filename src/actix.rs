//! actix-web integration: header conversion, a per-request middleware and an extractor.

use std::cell::{RefCell, RefMut};
use std::future::{ready, Future, Ready};
use std::rc::Rc;
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use crate::{ServerTiming, ServerTimingError, ServerTimingHeaders, ServerTimingOptions, SERVER_TIMING, TIMING_ALLOW_ORIGIN};

impl ServerTimingHeaders {
    pub fn to_header_map(&self) -> Result<HeaderMap, ServerTimingError> {
        let mut header_map = HeaderMap::new();
        self.insert_into(&mut header_map)?;
        Ok(header_map)
    }

    /// Inserts the headers, replacing existing values. Nothing is inserted if any value is invalid.
    pub fn insert_into(&self, header_map: &mut HeaderMap) -> Result<(), ServerTimingError> {
        let server_timing = header_value(SERVER_TIMING, &self.server_timing)?;
        let allow_origin = match self.timing_allow_origin.as_deref() {
            Some(origin) => Some(header_value(TIMING_ALLOW_ORIGIN, origin)?),
            None => None,
        };
        header_map.insert(HeaderName::from_static("server-timing"), server_timing);
        if let Some(allow_origin) = allow_origin {
            header_map.insert(HeaderName::from_static("timing-allow-origin"), allow_origin);
        }
        Ok(())
    }
}

fn header_value(header: &'static str, value: &str) -> Result<HeaderValue, ServerTimingError> {
    HeaderValue::from_str(value).map_err(|err| {
        tracing::debug!("Invalid {header} header value '{value}': {err}");
        ServerTimingError::InvalidHeaderValue{header}
    })
}

/// Handle to the recorder of the current request.
///
/// actix-web runs a request on a single worker thread, so the handle is not `Send`.
#[derive(Debug, Clone)]
pub struct RequestTiming(Rc<RefCell<ServerTiming>>);

impl RequestTiming {
    pub fn new(timing: ServerTiming) -> Self {
        Self(Rc::new(RefCell::new(timing)))
    }

    /// Panics if the recorder is already borrowed, like [`RefCell::borrow_mut`].
    /// Prefer the methods on this handle, which only borrow for the duration of the call.
    pub fn borrow_mut(&self) -> RefMut<'_, ServerTiming> {
        self.0.borrow_mut()
    }

    pub fn start(&self, name: &str, description: Option<&str>) {
        self.0.borrow_mut().start(name, description);
    }

    pub fn end(&self, name: &str) -> Result<(), ServerTimingError> {
        self.0.borrow_mut().end(name)
    }

    pub fn add(&self, name: &str, duration_ms: f64, description: Option<&str>) {
        self.0.borrow_mut().add(name, duration_ms, description);
    }

    /// Like [`ServerTiming::time`], but the recorder is not borrowed while `body` runs,
    /// so `body` may record its own intervals through another handle.
    pub fn time<T>(&self, name: &str, body: impl FnOnce() -> T, description: Option<&str>) -> T {
        let _guard = SharedIntervalGuard::start(self.clone(), name, description);
        body()
    }

    /// Like [`ServerTiming::time_async`], but the recorder is not borrowed while `body` runs,
    /// so `body` may record its own intervals through another handle.
    pub async fn time_async<T, F, Fut>(&self, name: &str, body: F, description: Option<&str>) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = SharedIntervalGuard::start(self.clone(), name, description);
        body().await
    }

    pub fn headers(&self) -> Option<ServerTimingHeaders> {
        match self.0.try_borrow_mut() {
            Ok(mut timing) => Some(timing.headers()),
            Err(err) => {
                tracing::warn!("Could not render Server-Timing, recorder is still borrowed: {err}");
                None
            }
        }
    }
}

struct SharedIntervalGuard {
    timing: RequestTiming,
    name: String,
}

impl SharedIntervalGuard {
    fn start(timing: RequestTiming, name: &str, description: Option<&str>) -> Self {
        timing.start(name, description);
        Self{
            timing,
            name: name.to_owned(),
        }
    }
}

impl Drop for SharedIntervalGuard {
    fn drop(&mut self) {
        let result = match self.timing.0.try_borrow_mut() {
            Ok(mut timing) => timing.end(&self.name),
            Err(err) => {
                tracing::warn!("Could not end interval {}, recorder is still borrowed: {err}", self.name);
                return;
            }
        };
        // the body may already have ended the interval itself
        if let Err(err) = result {
            tracing::debug!("{err}");
        }
    }
}

impl FromRequest for RequestTiming {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let timing = req.extensions().get::<RequestTiming>().cloned();
        ready(timing.ok_or_else(|| {
            tracing::error!("RequestTiming requested, but ServerTimingMiddleware is not installed");
            actix_web::error::ErrorInternalServerError("Server timing is not available for this request")
        }))
    }
}

/// Creates a [`ServerTiming`] for every request and attaches its headers to the response.
#[derive(Debug, Clone, Default)]
pub struct ServerTimingMiddleware {
    options: ServerTimingOptions,
}

impl ServerTimingMiddleware {
    pub fn new(options: ServerTimingOptions) -> Self {
        Self{options}
    }
}

impl<S, B> Transform<S, ServiceRequest> for ServerTimingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ServerTimingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ServerTimingService{
            service,
            options: Rc::new(self.options.clone()),
        }))
    }
}

pub struct ServerTimingService<S> {
    service: S,
    options: Rc<ServerTimingOptions>,
}

impl<S, B> Service<ServiceRequest> for ServerTimingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let timing = RequestTiming::new(ServerTiming::new(self.options.as_ref().clone()));
        req.extensions_mut().insert(timing.clone());
        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?;
            if let Some(headers) = timing.headers() {
                if let Err(err) = headers.insert_into(res.headers_mut()) {
                    tracing::warn!("Not attaching Server-Timing headers: {err}");
                }
            }
            Ok(res)
        })
    }
}
