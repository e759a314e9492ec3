//! Typed client for the tactical report backend.

pub mod backend;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod wire;

pub use backend::BackendApi;
pub use error::ApiError;
pub use http::HttpBackend;
#[cfg(feature = "mock")]
pub use mock::MockBackend;
pub use wire::{
    ChatContext, ChatReply, ChatReportContext, ChatRequest, FieldSuggestion, FormContext,
    GenerateRequest, GenerateResponse, ReanalyzeSummary, SubmittedReport,
};
