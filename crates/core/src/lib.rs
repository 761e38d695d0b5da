//! Business logic services for comunimapp.
//!
//! Each service owns one concern (users, reports, case updates, notifications,
//! push, email, media, metrics, AI analysis) and talks to the document store
//! through the typed repositories in `comunimapp-db`. External vendors are
//! reached over HTTP; side-effect failures (email, push, AI) are logged and
//! swallowed, never propagated to the caller.

pub mod services;

pub use services::ai::{AiAnalysis, AiService};
pub use services::authorization::{ReportView, UserView};
pub use services::case_update::{CaseUpdateService, CaseUpdateView, CreateCaseUpdateInput};
pub use services::email::EmailService;
pub use services::identity::IdentityService;
pub use services::media::{MediaService, UploadedImage};
pub use services::metrics::{DashboardResponse, MetricsService};
pub use services::notification::NotificationService;
pub use services::push_notification::PushService;
pub use services::report::{CreateReportInput, ReportService};
pub use services::session::{SessionClaims, SessionService};
pub use services::user::{LoginResponse, RegisterInput, UpdateUserInput, UserService};
pub use services::workflow;
