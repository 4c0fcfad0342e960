pub mod checkout;
pub mod errors;
pub mod lock;
pub mod models;
pub mod routing;
pub mod snapshot;
pub mod store;
pub mod telemetry;
pub mod transition;

pub use checkout::{admit_job, checkout, ensure_workspace, JobCheckout, ProjectSeed};
pub use errors::{AppError, AppResult};
pub use lock::{acquire_or_in_use, AcquireOutcome, LockService, MarkerFileLock};
pub use models::{Job, NoteLog, Project, ProjectStatus};
pub use routing::{CompletionNotifier, DestinationResolver, WorkspaceValidator};
pub use snapshot::{group_by_job, jobs_at_a_glance, jobs_at_a_glance_now, DueSummary, SnapshotAggregator};
pub use store::JobStore;
pub use transition::{apply_status, close_job, ClosedJobSummary, StatusReport};
