//! FAI/CoC Common Library
//!
//! 照合パイプラインの各ステージとCLIで共有される型とユーティリティ

pub mod types;
pub mod error;
pub mod normalize;
pub mod results;
pub mod export;

pub use types::{
    IdentifierRecord, JobState, MatchCandidate, MatchRule, OutcomeRecord, OutcomeStatus,
    OutputMode,
};
pub use error::{Error, Result};
pub use results::{ExportRow, ResultFilter, ResultSet, Summary, EXPORT_HEADERS};
