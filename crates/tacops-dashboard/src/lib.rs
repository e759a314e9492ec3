//! Selection, report aggregation and form-builder logic behind the
//! tactical ops dashboard.

pub mod aggregator;
pub mod chat;
pub mod controller;
pub mod forms;
pub mod poller;
pub mod registry;
pub mod session;

pub use aggregator::{filter_by_members, ReportAggregator};
pub use chat::{ChatMessage, ChatRole, ChatSession};
pub use controller::{
    SelectionController, SelectionSnapshot, SelectionTicket, SuggestionContext, ViewFlags,
    ViewMode,
};
pub use forms::{
    CasevacFields, EoincrepFields, FormError, FormFields, FormTarget, FragoFields,
};
pub use poller::{PeriodicTask, SuggestionAlert, SuggestionFeed, SuggestionPoller};
pub use registry::SessionRegistry;
pub use session::{Dashboard, FormDraft, HierarchySnapshot};
