//! `fmrest-http` is an async client for the FileMaker Data API.
//!
//! [`FmClient`] logs in, runs record operations against named layouts and
//! maps responses into [`Record`] and [`Foundset`] values:
//! - [`FmClient::create_record`], [`FmClient::edit_record`], [`FmClient::delete_record`]
//! - [`FmClient::get_record`], [`FmClient::get_records`], [`FmClient::find`]
//! - [`FmClient::perform_script`], [`FmClient::set_globals`]
//! - [`FmClient::fetch_file`] for container field contents
//!
//! Every call that needs a session logs in again once when the token has
//! expired ([`with_auto_relogin`]). Reads can additionally be retried while
//! the server reports a missing record ([`with_not_found_retry`]); the retry
//! wraps the relogin, so each attempt may relogin on its own.

mod client;
mod decode;
mod error;
mod foundset;
mod options;
mod record;
mod relogin;
mod requests;
mod retry;
mod types;
mod wire;

#[cfg(feature = "raw-mode")]
pub mod raw;

pub use client::FmClient;
pub use error::{ErrorCode, ErrorKind, FmError};
pub use foundset::Foundset;
pub use options::{ClientOptions, NotFoundRetry};
pub use record::Record;
pub use relogin::with_auto_relogin;
pub use requests::{
    EditRecord, FieldData, Find, FindRequest, GetRecord, GetRecords, NewRecord, Portal,
    ScriptCall, Scripts, SortDirection, SortOrder,
};
pub use retry::with_not_found_retry;
pub use types::{ContainerFile, DataInfo, ScriptPhase, ScriptResult};

pub type Result<T> = std::result::Result<T, FmError>;
