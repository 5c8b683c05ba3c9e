// --- Core Application Schemas ---
//
// Row structs derive `FromRow` and map one table each; request payloads derive
// `Validate` and are checked by the `ValidatedJson` extractor before a handler runs.
// Everything crossing the HTTP boundary also derives `TS` (TypeScript bindings for the
// frontend) and `ToSchema` (OpenAPI).

pub mod activity;
pub mod employee;
pub mod feature_request;
pub mod question;
pub mod role;
pub mod user;

pub use activity::{ActivityFilter, ActivityLog, CreateActivityRequest, NewActivity};
pub use employee::{
    BulkUploadSummary, CreateEmployeeRequest, Employee, RowFailure, UpdateEmployeeRequest,
};
pub use feature_request::{
    CreateFeatureRequest, FeatureRequest, FeatureRequestStatus, UpdateFeatureRequest,
    VoteOutcome, VoteRequest, VoteType,
};
pub use question::{
    CreateCommentRequest, CreateQuestionRequest, Difficulty, Question, QuestionComment,
    QuestionStatus, QuestionStatusInfo, QuestionType, StatusChangeRequest, StatusHistoryEntry,
    UpdateQuestionRequest,
};
pub use role::{
    CreateRoleRequest, Permission, Role, RoleWithPermissions, SetPermissionsRequest,
    UpdateRoleRequest,
};
pub use user::{
    AssignRolesRequest, CreateUserRequest, LoginRequest, Profile, RefreshRequest,
    RefreshTokenRecord, TokenResponse, UpdateUserRequest, User, UserCredentials, UserWithRoles,
};
