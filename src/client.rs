use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde_json::Value as JsonValue;

use crate::{
    decode::{self, Target},
    wire::ApiRequest,
    with_auto_relogin, with_not_found_retry, ClientOptions, ContainerFile, EditRecord, ErrorCode,
    FieldData, Find, FmError, Foundset, GetRecord, GetRecords, NewRecord, Record, Result,
    ScriptPhase, ScriptResult, Scripts,
};

/// State shared by all clones of one client.
#[derive(Default)]
struct Session {
    token: Option<String>,
    last_error: Option<ErrorCode>,
    last_script_result: BTreeMap<ScriptPhase, ScriptResult>,
}

#[derive(Clone)]
/// HTTP client for the FileMaker Data API of one database.
pub struct FmClient {
    http: reqwest::Client,
    url: String,
    database: String,
    user: String,
    password: String,
    headers: HeaderMap,
    options: ClientOptions,
    session: Arc<Mutex<Session>>,
}

impl fmt::Debug for FmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FmClient")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("logged_in", &self.is_logged_in())
            .field("options", &self.options)
            .finish()
    }
}

impl FmClient {
    /// Creates a client for `database` on the server at `url`
    /// (e.g. `https://fms.example.com`). No request is made until
    /// [`FmClient::login`].
    pub fn new(
        url: impl AsRef<str>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let options = ClientOptions::default();
        Self {
            http: build_http_client(&options).unwrap_or_else(|_| reqwest::Client::new()),
            url: url.as_ref().trim_end_matches('/').to_owned(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            headers,
            options,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `FMREST_URL`: server address, e.g. `https://fms.example.com`
    /// - `FMREST_DATABASE`: database name without extension
    /// - `FMREST_USER` / `FMREST_PASSWORD`: account with the `fmrest`
    ///   extended privilege
    /// - `FMREST_TIMEOUT`: optional request timeout in seconds
    ///
    /// Returns an error if a required variable is missing or empty.
    ///
    /// **Not available on `wasm32` targets.**
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> std::result::Result<Self, String> {
        fn required(name: &str) -> std::result::Result<String, String> {
            let value = std::env::var(name)
                .map_err(|_| format!("missing {name} environment variable"))?;
            if value.trim().is_empty() {
                return Err(format!("{name} is set but empty"));
            }
            Ok(value)
        }

        let url = required("FMREST_URL")?;
        let database = required("FMREST_DATABASE")?;
        let user = required("FMREST_USER")?;
        let password = required("FMREST_PASSWORD")?;

        let mut client = Self::new(url, database, user, password);
        if let Ok(timeout) = std::env::var("FMREST_TIMEOUT") {
            let secs = timeout
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("FMREST_TIMEOUT must be whole seconds, got '{timeout}'"))?;
            client.options.timeout_ms = secs.saturating_mul(1_000);
        }
        Ok(client)
    }

    /// Applies client options. Rebuilds the HTTP client so the TLS
    /// verification switch takes effect.
    pub fn with_options(mut self, opts: ClientOptions) -> Result<Self> {
        self.http = build_http_client(&opts)?;
        self.options = opts;
        Ok(self)
    }

    /// Adds a header sent with every request. `Authorization` is managed by
    /// the client and gets replaced or removed on each call.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn token(&self) -> Option<String> {
        self.session().token.clone()
    }

    /// Reuses a token obtained elsewhere instead of logging in.
    pub fn set_token(&self, token: impl Into<String>) {
        self.session().token = Some(token.into());
    }

    pub fn clear_token(&self) {
        self.session().token = None;
    }

    pub fn is_logged_in(&self) -> bool {
        self.session().token.is_some()
    }

    /// Code of the most recent response; `None` before the first call.
    pub fn last_error(&self) -> Option<ErrorCode> {
        self.session().last_error
    }

    /// Scripts reported by the most recent response, failed calls included.
    pub fn last_script_result(&self) -> BTreeMap<ScriptPhase, ScriptResult> {
        self.session().last_script_result.clone()
    }

    /// Opens a session and stores its token.
    pub async fn login(&self) -> Result<String> {
        let request = decode::build_login(self.target(), &self.user, &self.password);
        let data = self.call_filemaker(&request).await?;
        let token = decode::decode_token(&data)?;
        self.session().token = Some(token.clone());
        Ok(token)
    }

    /// Closes the current session. The token is dropped before the call, so
    /// the request goes out without `Authorization`.
    pub async fn logout(&self) -> Result<bool> {
        let token = self.session().token.take().ok_or(FmError::NotLoggedIn)?;
        let request = decode::build_logout(self.target(), &token);
        let data = self.call_filemaker(&request).await?;
        Ok(decode::response_status(&data).0.is_success())
    }

    /// Creates a record and returns its id.
    pub async fn create_record(&self, layout: &str, record: impl Into<NewRecord>) -> Result<i64> {
        let request = decode::build_create_record(self.target(), layout, record.into());
        let data = self.call_authenticated(&request).await?;
        decode::decode_record_id(&data)
    }

    /// Edits a record; failures, including a `modId` mismatch, are errors.
    pub async fn edit_record(
        &self,
        layout: &str,
        record_id: i64,
        edit: impl Into<EditRecord>,
    ) -> Result<bool> {
        let request = decode::build_edit_record(self.target(), layout, record_id, edit.into());
        let data = self.call_authenticated(&request).await?;
        Ok(decode::response_status(&data).0.is_success())
    }

    pub async fn delete_record(
        &self,
        layout: &str,
        record_id: i64,
        scripts: Scripts,
    ) -> Result<bool> {
        let request = decode::build_delete_record(self.target(), layout, record_id, &scripts);
        let data = self.call_authenticated(&request).await?;
        Ok(decode::response_status(&data).0.is_success())
    }

    /// Fetches one record. Retried on not-found when enabled in
    /// [`ClientOptions::not_found_retry`].
    pub async fn get_record(
        &self,
        layout: &str,
        record_id: i64,
        options: GetRecord,
    ) -> Result<Record> {
        let request = decode::build_get_record(self.target(), layout, record_id, &options)?;
        let data = self.call_read(&request).await?;
        decode::decode_first_record(&data)
    }

    /// Fetches a range of records. Retried on not-found when enabled.
    pub async fn get_records(&self, layout: &str, options: GetRecords) -> Result<Foundset> {
        let request = decode::build_get_records(self.target(), layout, &options)?;
        let data = self.call_read(&request).await?;
        decode::decode_foundset(&data)
    }

    /// Runs a find. An empty result is reported by the server as error 401
    /// and therefore surfaces as a not-found error.
    pub async fn find(&self, layout: &str, find: Find) -> Result<Foundset> {
        let request = decode::build_find(self.target(), layout, &find)?;
        let data = self.call_read(&request).await?;
        decode::decode_foundset(&data)
    }

    pub async fn perform_script(
        &self,
        layout: &str,
        name: &str,
        param: Option<&str>,
    ) -> Result<ScriptResult> {
        let request = decode::build_perform_script(self.target(), layout, name, param);
        let data = self.call_authenticated(&request).await?;
        decode::decode_script_result(&data)
    }

    /// Sets global fields for the current session. Names must be fully
    /// qualified, e.g. `Table::g_field`.
    pub async fn set_globals(&self, globals: FieldData) -> Result<bool> {
        let request = decode::build_set_globals(self.target(), globals);
        let data = self.call_authenticated(&request).await?;
        Ok(decode::response_status(&data).0.is_success())
    }

    /// Downloads the contents of a container field.
    ///
    /// `file_url` is the streaming URL a record carries in the container
    /// field. The server ties that URL to a cookie set on the first request,
    /// which the HTTP client keeps for later downloads.
    pub async fn fetch_file(&self, file_url: &str) -> Result<ContainerFile> {
        let url = Url::parse(file_url)
            .map_err(|err| FmError::InvalidUrl(format!("{file_url}: {err}")))?;
        let url = &url;
        with_auto_relogin(
            self.options.auto_relogin,
            move || self.download(url),
            move || self.relogin(),
        )
        .await
    }

    /// Sends an arbitrary authenticated request below the server URL and
    /// returns the decoded body. `path` is split on `/` and each piece is
    /// escaped like any other name.
    #[cfg(feature = "raw-mode")]
    pub async fn request_raw(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<JsonValue>,
        params: Vec<(String, String)>,
    ) -> Result<crate::raw::RawResponse> {
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();
        let mut request = ApiRequest::new(method, segments).with_params(params);
        request.body = body;
        let data = self.call_authenticated(&request).await?;
        Ok(crate::raw::RawResponse(data))
    }

    fn target(&self) -> Target<'_> {
        Target {
            api_version: &self.options.api_version,
            database: &self.database,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read path: not-found retry around relogin around one round trip.
    async fn call_read(&self, request: &ApiRequest) -> Result<JsonValue> {
        with_not_found_retry(&self.options.not_found_retry, move || {
            self.call_authenticated(request)
        })
        .await
    }

    async fn call_authenticated(&self, request: &ApiRequest) -> Result<JsonValue> {
        with_auto_relogin(
            self.options.auto_relogin,
            move || self.call_filemaker(request),
            move || self.relogin(),
        )
        .await
    }

    async fn relogin(&self) -> Result<()> {
        self.clear_token();
        self.login().await.map(|_| ())
    }

    /// One round trip: attach the session, send, decode, check `messages`.
    async fn call_filemaker(&self, request: &ApiRequest) -> Result<JsonValue> {
        let token = match request.basic_auth {
            Some(_) => None,
            None => self.token(),
        };
        let mut headers = self.headers.clone();
        apply_session(&mut headers, token.as_deref())?;

        let url = request.url(&self.url)?;
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(headers)
            .timeout(Duration::from_millis(self.options.timeout_ms));
        if let Some((user, password)) = &request.basic_auth {
            builder = builder.basic_auth(user, Some(password));
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("{} {}", request.method, request.path());

        let response = builder.send().await.map_err(FmError::Transport)?;
        let body = response.text().await.map_err(FmError::Transport)?;
        self.handle_response(body)
    }

    /// One container GET. A failure status is read as a Data API error body,
    /// so an expired session surfaces as code 952.
    async fn download(&self, url: &Url) -> Result<ContainerFile> {
        let mut headers = self.headers.clone();
        headers.remove(header::CONTENT_TYPE);
        headers.remove(header::AUTHORIZATION);

        #[cfg(feature = "tracing")]
        tracing::debug!("GET container {}", url.path());

        let response = self
            .http
            .get(url.clone())
            .headers(headers)
            .timeout(Duration::from_millis(self.options.timeout_ms))
            .send()
            .await
            .map_err(FmError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(FmError::Transport)?;
            self.handle_response(body)?;
            return Err(FmError::Decode(format!(
                "container download failed with HTTP {status}"
            )));
        }

        let content_type = header_text(response.headers(), header::CONTENT_TYPE);
        let content_length =
            header_text(response.headers(), header::CONTENT_LENGTH).and_then(|len| len.parse().ok());
        let data = response.bytes().await.map_err(FmError::Transport)?;

        Ok(ContainerFile {
            name: file_name(url),
            content_type,
            content_length,
            data,
        })
    }

    /// Decodes a body and records its code as `last_error`.
    fn handle_response(&self, body: String) -> Result<JsonValue> {
        let data = match serde_json::from_str::<JsonValue>(&body) {
            Ok(data) => data,
            Err(source) => return Err(FmError::BadJson { source, body }),
        };

        let (code, message) = decode::response_status(&data);
        let mut session = self.session();
        session.last_error = Some(code);
        session.last_script_result = decode::decode_script_results(&data);
        if !code.is_success() {
            return Err(FmError::remote(code, message));
        }
        Ok(data)
    }
}

/// Attaches `Authorization: Bearer <token>` when a token is held and strips
/// any `Authorization` header otherwise.
fn apply_session(headers: &mut HeaderMap, token: Option<&str>) -> Result<()> {
    match token {
        Some(token) => {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                FmError::Decode("session token is not a valid header value".to_owned())
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        None => {
            headers.remove(header::AUTHORIZATION);
        }
    }
    Ok(())
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default()
        .to_owned()
}

fn build_http_client(opts: &ClientOptions) -> Result<reqwest::Client> {
    let builder = reqwest::Client::builder();

    // Certificate checks and the cookie jar belong to the browser on wasm.
    #[cfg(not(target_arch = "wasm32"))]
    let builder = builder
        .danger_accept_invalid_certs(!opts.verify_ssl)
        .cookie_store(true);
    #[cfg(target_arch = "wasm32")]
    let _ = opts;

    builder.build().map_err(FmError::Transport)
}
