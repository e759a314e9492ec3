pub mod documents;
pub mod domain;
pub mod error;
pub mod hierarchy;
pub mod ids;
pub mod report;
pub mod suggestion;
pub mod time;
pub mod tree;

pub use documents::{download_filename, DocumentKind, GeneratedDocument};
pub use domain::{RawInput, Soldier, SoldierStatus, Unit, UnitRecord};
pub use error::{ErrorCode, TacopsError, TacopsResult};
pub use hierarchy::{build_hierarchy, count_units, find_soldier, find_unit};
pub use ids::{InputId, ReportId, SoldierId, SuggestionId, UnitId};
pub use report::{count_by_type, NewReport, Report, ReportCategory, ReportType, ReportTypeCount};
pub use suggestion::{Suggestion, SuggestionStatus, SuggestionType, Urgency};
pub use time::now_rfc3339;
pub use tree::{NodeKind, NodeRef, TreeNode};
