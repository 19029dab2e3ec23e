//! Interceptor pipeline
//!
//! The request and response stages wrapped around the transport as a single tower
//! layer. Any service speaking `ApiRequest -> ApiResponse` with a
//! [`TransportFailure`] error can sit underneath, which is how tests swap the
//! network for a `service_fn`.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower::{Layer, Service, ServiceBuilder, ServiceExt};

use crate::{
    config::GateConfig,
    error::{ApiError, TransportFailure},
    events::AuthEvents,
    request::{ApiRequest, ApiResponse},
    routes::NavigatorState,
    session::SessionState,
    transport::ReqwestTransport,
};

pub mod request;
pub mod response;

pub use request::RequestInterceptor;
pub use response::ResponseInterceptor;

/// InterceptorLayer
///
/// Wraps a transport service with both interceptor stages.
#[derive(Clone)]
pub struct InterceptorLayer {
    request: RequestInterceptor,
    response: ResponseInterceptor,
}

impl InterceptorLayer {
    pub fn new(request: RequestInterceptor, response: ResponseInterceptor) -> Self {
        Self { request, response }
    }
}

impl<S> Layer<S> for InterceptorLayer {
    type Service = InterceptorService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptorService {
            inner,
            request: self.request.clone(),
            response: self.response.clone(),
        }
    }
}

/// InterceptorService
///
/// The request stage runs to completion before the inner call is created; the
/// response stage runs on that same call's failure, including timeouts and
/// aborted connections.
#[derive(Clone)]
pub struct InterceptorService<S> {
    inner: S,
    request: RequestInterceptor,
    response: ResponseInterceptor,
}

impl<S> Service<ApiRequest> for InterceptorService<S>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = TransportFailure>,
    S::Future: Send + 'static,
{
    type Response = ApiResponse;
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<ApiResponse, ApiError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.inner.poll_ready(cx) {
            Poll::Ready(Err(failure)) => Poll::Ready(Err(self.response.on_error(failure))),
            other => other.map(|_| Ok(())),
        }
    }

    fn call(&mut self, req: ApiRequest) -> Self::Future {
        let req = self.request.intercept(req);
        let response = self.response.clone();
        let call = self.inner.call(req);

        Box::pin(async move { call.await.map_err(|failure| response.on_error(failure)) })
    }
}

/// ApiClient
///
/// What application code talks to: the interceptor pipeline over reqwest.
#[derive(Clone)]
pub struct ApiClient {
    service: InterceptorService<ReqwestTransport>,
}

impl ApiClient {
    pub fn new(
        config: &GateConfig,
        session: SessionState,
        events: AuthEvents,
        navigator: NavigatorState,
    ) -> Result<Self, reqwest::Error> {
        let transport = ReqwestTransport::new(config)?;
        let layer = InterceptorLayer::new(
            RequestInterceptor::from_config(session.clone(), config),
            ResponseInterceptor::new(session, events, navigator),
        );

        Ok(Self {
            service: ServiceBuilder::new().layer(layer).service(transport),
        })
    }

    pub async fn send(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.service.clone().oneshot(req).await
    }

    pub async fn get(&self, target: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::get(target)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, target: &str) -> Result<T, ApiError> {
        let response = self.get(target).await?;
        decode(&response)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        target: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::post(target).json(body)).await?;
        decode(&response)
    }

    pub async fn put_json<T: DeserializeOwned>(
        &self,
        target: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::put(target).json(body)).await?;
        decode(&response)
    }

    pub async fn delete(&self, target: &str) -> Result<ApiResponse, ApiError> {
        self.send(ApiRequest::delete(target)).await
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ApiError> {
    response.json().map_err(|e| {
        let message = format!("invalid JSON in response: {e}");
        ApiError {
            status: Some(response.status.as_u16()),
            details: json!({ "message": message }),
            message,
        }
    })
}
