use std::borrow::Cow;

use reqwest::{
    Method, StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// RequestBody
///
/// Payload of an outgoing call. Only `Json` is considered structured; binary and
/// multipart bodies carry their own content headers at the transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Binary(Vec<u8>),
    Multipart(Vec<FormPart>),
}

impl RequestBody {
    pub fn is_structured(&self) -> bool {
        matches!(self, RequestBody::Json(_))
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub mime: Option<String>,
    pub data: Vec<u8>,
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            mime: None,
            data: value.into().into_bytes(),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            mime: None,
            data,
        }
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// ApiRequest
///
/// Descriptor of one outgoing call, relative to the configured API base URL.
/// Query parameters are kept decoded and in order; encoding happens once, in
/// [`ApiRequest::query_string`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    /// Builds a request from a target such as `/Dogovor?foo=1&nomer=7`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };

        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            query,
            body: RequestBody::Empty,
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: &str) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn patch(target: &str) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: &str) -> Self {
        Self::new(Method::DELETE, target)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn json_body<T: Serialize>(self, body: &T) -> Result<Self, serde_json::Error> {
        Ok(self.json(serde_json::to_value(body)?))
    }

    pub fn binary(mut self, data: Vec<u8>) -> Self {
        self.body = RequestBody::Binary(data);
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// First value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Encoded query string, or `None` when the request has no parameters.
    pub fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let encoded = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        Some(encoded)
    }

    /// Path plus encoded query string.
    pub fn target(&self) -> String {
        match self.query_string() {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

/// Form-style decoding: `+` is a space, then percent escapes.
fn decode(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .unwrap_or(Cow::Borrowed(raw.as_str()))
        .into_owned()
}

/// ApiResponse
///
/// A successful (2xx) response. The body is kept raw; callers decode what they expect.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
