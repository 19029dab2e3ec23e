use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use reqwest::{
    Client, Url,
    multipart::{Form, Part},
};
use serde_json::Value;
use tower::Service;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::GateConfig,
    error::TransportFailure,
    request::{ApiRequest, ApiResponse, FormPart, RequestBody},
};

/// ReqwestTransport
///
/// Puts an already-intercepted [`ApiRequest`] on the wire. Non-2xx statuses come
/// back as [`TransportFailure::Status`]; nothing is retried here.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &GateConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, &config.api_base_url, config.timeout))
    }

    pub fn with_client(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn url_for(&self, req: &ApiRequest) -> Result<Url, TransportFailure> {
        let path = req.path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| TransportFailure::Network(format!("invalid request URL: {e}")))?;
        // Already encoded; written verbatim so strict endpoints get exactly `nomer=...`.
        url.set_query(req.query_string().as_deref());
        Ok(url)
    }

    async fn dispatch(
        client: Client,
        timeout: Duration,
        url: Url,
        req: ApiRequest,
    ) -> Result<ApiResponse, TransportFailure> {
        let mut builder = client
            .request(req.method.clone(), url)
            .headers(req.headers);

        builder = match req.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(
                serde_json::to_vec(&value)
                    .map_err(|e| TransportFailure::Network(format!("unencodable body: {e}")))?,
            ),
            RequestBody::Binary(bytes) => builder.body(bytes),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?
            .to_vec();

        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "request completed");
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        } else {
            tracing::debug!(status = status.as_u16(), "request rejected by server");
            Err(TransportFailure::Status {
                status,
                body: error_body(&body),
            })
        }
    }
}

impl Service<ApiRequest> for ReqwestTransport {
    type Response = ApiResponse;
    type Error = TransportFailure;
    type Future = Pin<Box<dyn Future<Output = Result<ApiResponse, TransportFailure>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApiRequest) -> Self::Future {
        let span = tracing::info_span!(
            "api_request",
            method = %req.method,
            path = %req.path,
            req_id = %Uuid::new_v4(),
        );
        let url = self.url_for(&req);
        let client = self.client.clone();
        let timeout = self.timeout;

        Box::pin(
            async move { Self::dispatch(client, timeout, url?, req).await }.instrument(span),
        )
    }
}

fn build_form(parts: Vec<FormPart>) -> Result<Form, TransportFailure> {
    parts.into_iter().try_fold(Form::new(), |form, part| {
        let mut body = Part::bytes(part.data);
        if let Some(file_name) = part.file_name {
            body = body.file_name(file_name);
        }
        if let Some(mime) = part.mime {
            body = body
                .mime_str(&mime)
                .map_err(|e| TransportFailure::Network(format!("invalid part mime type: {e}")))?;
        }
        Ok(form.part(part.name, body))
    })
}

/// JSON when the server sent JSON, otherwise the plain text of a non-empty body.
fn error_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok().or_else(|| {
        std::str::from_utf8(bytes)
            .ok()
            .map(|text| Value::String(text.trim().to_string()))
    })
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> TransportFailure {
    if error.is_timeout() {
        TransportFailure::Timeout(timeout)
    } else {
        TransportFailure::Network(error.to_string())
    }
}
