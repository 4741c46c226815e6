use bytes::Bytes;
use serde::Deserialize;

use crate::ErrorCode;

/// `dataInfo` block of a range read or find response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub total_record_count: Option<u64>,
    #[serde(default)]
    pub found_count: Option<u64>,
    #[serde(default)]
    pub returned_count: Option<u64>,
}

/// Outcome of a script run by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptResult {
    /// Script error code; `0` when the script ran cleanly.
    pub error: ErrorCode,
    /// Value passed to `Exit Script [Result]`, if any.
    pub result: Option<String>,
}

/// Contents of a container field downloaded with
/// [`FmClient::fetch_file`](crate::FmClient::fetch_file).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerFile {
    /// Last path segment of the container URL, as sent by the server.
    pub name: String,
    pub content_type: Option<String>,
    /// `Content-Length` header; absent for chunked responses.
    pub content_length: Option<u64>,
    pub data: Bytes,
}

/// Phase at which a script ran relative to the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptPhase {
    Prerequest,
    Presort,
    After,
}

impl ScriptPhase {
    pub(crate) const ALL: [Self; 3] = [Self::Prerequest, Self::Presort, Self::After];

    /// Suffix of the `scriptError`/`scriptResult` response keys.
    pub(crate) fn response_suffix(self) -> &'static str {
        match self {
            Self::Prerequest => ".prerequest",
            Self::Presort => ".presort",
            Self::After => "",
        }
    }
}
