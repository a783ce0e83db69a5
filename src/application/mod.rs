pub mod content;
pub mod error;
pub mod providers;
pub mod registry;
pub mod revalidation;

pub use content::ContentService;
pub use error::AppError;
pub use providers::{ContentProvider, ProviderError, WebhookTarget, WebhookVerification};
pub use registry::AdapterRegistry;
pub use revalidation::{RevalidationService, WebhookOutcome};
