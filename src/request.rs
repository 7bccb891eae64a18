use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::errors::Error;

/// One part of a multipart upload.
#[derive(Clone, Debug)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Multipart body kept in a cloneable form so an upload can be replayed
/// after a session refresh.
#[derive(Clone, Debug, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.map(str::to_string),
            bytes: bytes.into(),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub(crate) fn to_reqwest(&self) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut p = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone());
                    if let Some(mime) = mime {
                        p = p.mime_str(mime)?;
                    }
                    form.part(name.clone(), p)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Vec<u8>),
    Multipart(MultipartForm),
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

/// Everything needed to send (and re-send) a request.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    pub method: Method,
    /// Relative to the configured base URL unless it carries its own scheme.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = RequestBody::Json(serde_json::to_vec(body)?);
        Ok(self)
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Path plus urlencoded query string, as it goes on the wire.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let qs = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let sep = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.path, sep, qs)
    }

    /// Normalizes headers before every send.
    ///
    /// Multipart bodies must not carry a preset content type: the transport
    /// writes `multipart/form-data` with its own boundary. Credentials are
    /// never attached here; they travel in the cookie store.
    pub fn intercept(&mut self) {
        if !self.headers.contains_key(ACCEPT) {
            self.headers
                .insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        match self.body {
            RequestBody::Multipart(_) => {
                self.headers.remove(CONTENT_TYPE);
            }
            RequestBody::Json(_) => {
                if !self.headers.contains_key(CONTENT_TYPE) {
                    self.headers
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
            }
            RequestBody::Empty => {}
        }
    }

    /// Whether the request path is `endpoint`, possibly under a prefix.
    ///
    /// Matches whole slash-delimited segments at the end of the path; the
    /// query string and any scheme/host are ignored.
    pub fn targets(&self, endpoint: &str) -> bool {
        let endpoint = endpoint.trim_matches('/');
        if endpoint.is_empty() {
            return false;
        }
        let path = self.path.split(['?', '#']).next().unwrap_or_default();
        let path = if has_scheme(path) {
            path.split_once("://")
                .and_then(|(_, rest)| rest.split_once('/'))
                .map(|(_, p)| p)
                .unwrap_or_default()
        } else {
            path
        };
        let path = path.trim_matches('/');
        path == endpoint
            || path
                .strip_suffix(endpoint)
                .is_some_and(|prefix| prefix.ends_with('/'))
    }
}

/// `true` when `target` starts with `scheme://`, as opposed to merely
/// containing a URL somewhere in its query.
pub(crate) fn has_scheme(target: &str) -> bool {
    match target.split_once("://") {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
