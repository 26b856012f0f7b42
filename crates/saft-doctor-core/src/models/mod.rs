pub mod auth;
pub mod document;
pub mod fix_rule;
pub mod issue;
pub mod upload;
pub mod validation;

pub use auth::{LoginResponse, Me, UiCheck};
pub use document::{DocumentSource, DocumentsResponse, SaftDocument};
pub use fix_rule::{FixRule, FixRulePattern, FixRuleResponse};
pub use issue::{Fix, Issue, IssueLocation, SuggestedFix, Suggestion};
pub use upload::{
    chunk_ranges, ChunkRanges, FinishUploadRequest, StartUploadRequest, StartUploadResponse,
    UploadProgress, UploadSession, DEFAULT_CHUNK_SIZE,
};
pub use validation::{
    ApplyFixesRequest, ApplyFixesResponse, Operation, ValidationOptions, ValidationResult,
};
