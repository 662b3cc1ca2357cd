//! Business services. Repositories do the SQL, adapters talk to the
//! providers; the services own the rules in between.

pub mod audit;
pub mod checkout;
pub mod downloads;
pub mod entitlements;
pub mod notify;
pub mod pricing;
pub mod reconciler;
pub mod storage;

pub use audit::AuditRecorder;
pub use checkout::{CheckoutInput, CheckoutOutcome, CheckoutService};
pub use downloads::{DownloadService, IssuedDownload};
pub use entitlements::{EntitlementService, GrantSummary};
pub use notify::Mailer;
pub use reconciler::ReconcileService;
pub use storage::UrlSigner;
