use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::{
    config::GateConfig,
    endpoint::{EndpointClass, EndpointClassifier},
    request::ApiRequest,
    session::SessionState,
};

/// Legacy token header still read by the 1C services.
pub const TOKEN_HEADER: HeaderName = HeaderName::from_static("token");
/// Second legacy token header.
pub const X_AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-auth-token");

/// Query parameter that must never carry token material on normal endpoints.
const TOKEN_QUERY_PARAM: &str = "token";

/// RequestInterceptor
///
/// Rewrites every outgoing request before dispatch: content negotiation headers,
/// credentials for normal endpoints, and sanitization for strict endpoints.
/// Headers the caller set are never overwritten, so running it twice is a no-op.
#[derive(Clone)]
pub struct RequestInterceptor {
    session: SessionState,
    classifier: EndpointClassifier,
    strict_query_param: String,
}

impl RequestInterceptor {
    pub fn new(
        session: SessionState,
        classifier: EndpointClassifier,
        strict_query_param: impl Into<String>,
    ) -> Self {
        Self {
            session,
            classifier,
            strict_query_param: strict_query_param.into(),
        }
    }

    pub fn from_config(session: SessionState, config: &GateConfig) -> Self {
        Self::new(
            session,
            EndpointClassifier::from_config(config),
            config.strict_query_param.clone(),
        )
    }

    pub fn intercept(&self, mut req: ApiRequest) -> ApiRequest {
        let session = self.session.read_session();
        let token = session.as_ref().and_then(|s| s.token());

        set_if_absent(
            &mut req.headers,
            header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        if req.body.is_structured() {
            set_if_absent(
                &mut req.headers,
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        match self.classifier.classify(&req.path) {
            EndpointClass::Strict => self.sanitize_strict(&mut req),
            EndpointClass::Normal => attach_credentials(&mut req, token),
        }

        req
    }

    fn sanitize_strict(&self, req: &mut ApiRequest) {
        for name in [header::AUTHORIZATION, TOKEN_HEADER, X_AUTH_TOKEN_HEADER] {
            req.headers.remove(name);
        }

        let kept = req
            .query_param(&self.strict_query_param)
            .map(|value| (self.strict_query_param.clone(), value.trim().to_string()));

        if req.query.len() > usize::from(kept.is_some()) {
            tracing::debug!(
                path = %req.path,
                dropped = req.query.len() - usize::from(kept.is_some()),
                "dropping query parameters on strict endpoint"
            );
        }
        req.query = kept.into_iter().collect();
    }
}

fn attach_credentials(req: &mut ApiRequest, token: Option<&str>) {
    req.query.retain(|(key, _)| key != TOKEN_QUERY_PARAM);

    let Some(token) = token else {
        return;
    };

    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(bearer) => set_if_absent(&mut req.headers, header::AUTHORIZATION, bearer),
        Err(_) => {
            tracing::warn!(path = %req.path, "stored token is not a valid header value; sending without credentials");
            return;
        }
    }

    // Mirrors of the bearer token for older 1C services.
    if let Ok(raw) = HeaderValue::from_str(token) {
        set_if_absent(&mut req.headers, TOKEN_HEADER, raw.clone());
        set_if_absent(&mut req.headers, X_AUTH_TOKEN_HEADER, raw);
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    headers.entry(name).or_insert(value);
}
