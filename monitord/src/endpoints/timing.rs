//! Per-invocation timing for endpoints.

use super::{Call, Failer};
use crate::errors::EndpointError;
use prometheus::HistogramVec;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::debug;

/// Records one observation per call in a histogram labelled
/// `method` and `success`.
#[derive(Debug, Clone)]
pub struct InstrumentingLayer {
    method: &'static str,
    duration: HistogramVec,
}

impl InstrumentingLayer {
    pub fn new(method: &'static str, duration: HistogramVec) -> Self {
        Self { method, duration }
    }
}

impl<S> Layer<S> for InstrumentingLayer {
    type Service = Instrumenting<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Instrumenting {
            method: self.method,
            duration: self.duration.clone(),
            inner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instrumenting<S> {
    method: &'static str,
    duration: HistogramVec,
    inner: S,
}

impl<S, R> Service<Call<R>> for Instrumenting<S>
where
    S: Service<Call<R>, Error = EndpointError>,
    S::Response: Failer + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = EndpointError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, EndpointError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call<R>) -> Self::Future {
        let observation = Observation {
            method: self.method,
            duration: self.duration.clone(),
            start: Instant::now(),
            done: false,
        };
        let fut = self.inner.call(call);

        Box::pin(async move {
            let mut observation = observation;
            let result = fut.await;
            // a reply carrying a business error counts as a failed call
            observation.finish(matches!(&result, Ok(reply) if reply.failed().is_none()));
            result
        })
    }
}

/// One pending histogram observation. Dropping it unfinished records a
/// failed call, so an abandoned invocation is still counted.
struct Observation {
    method: &'static str,
    duration: HistogramVec,
    start: Instant,
    done: bool,
}

impl Observation {
    fn finish(&mut self, success: bool) {
        if self.done {
            return;
        }
        self.done = true;

        let elapsed = self.start.elapsed().as_secs_f64();
        self.duration
            .with_label_values(&[self.method, if success { "true" } else { "false" }])
            .observe(elapsed);
        debug!(method = self.method, success, elapsed, "endpoint call complete");
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.finish(false);
    }
}
