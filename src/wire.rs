use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::FmError;

/// One Data API call before it hits the transport.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Unescaped path segments below the server URL, starting with `fmi`.
    pub segments: Vec<String>,
    pub body: Option<JsonValue>,
    pub params: Vec<(String, String)>,
    /// Basic credentials replacing the session token (login only).
    pub basic_auth: Option<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, segments: Vec<String>) -> Self {
        Self {
            method,
            segments,
            body: None,
            params: Vec::new(),
            basic_auth: None,
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Readable path for logs; segments are joined without escaping.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Full request URL below `base`. Every segment is percent-encoded on
    /// its own, so `/`, `?` and `#` inside a name stay part of that name.
    pub fn url(&self, base: &str) -> Result<Url, FmError> {
        let mut url = Url::parse(base)
            .map_err(|err| FmError::InvalidUrl(format!("{base}: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| FmError::InvalidUrl(format!("{base} cannot carry a path")))?
            .pop_if_empty()
            .extend(&self.segments);
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub code: Option<JsonValue>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordData {
    #[serde(rename = "fieldData", default)]
    pub field_data: Map<String, JsonValue>,
    #[serde(rename = "portalData", default)]
    pub portal_data: Map<String, JsonValue>,
    #[serde(rename = "recordId", default)]
    pub record_id: Option<JsonValue>,
    #[serde(rename = "modId", default)]
    pub mod_id: Option<JsonValue>,
}
