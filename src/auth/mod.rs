//! Authentication workflow and the credential store it consumes.
//!
//! ## Enumeration
//!
//! Unknown identities, wrong secrets and unverified accounts all produce the
//! same [`AuthError::Failed`]. The specific reason is logged at `debug` and a
//! randomized [`FailureDelay`] is applied before the response.

mod delay;
mod error;
pub mod memory;
pub mod seed;
pub mod store;
pub(crate) mod utils;
mod workflow;

pub use delay::FailureDelay;
pub use error::AuthError;
pub use memory::{MemoryOutbox, MemoryStore};
pub use seed::Seed;
pub use store::{
    ApiKeyRecord, CredentialStore, LogTokenSender, TokenSender, UserRecord, VerificationMessage,
    VerificationRecord,
};
pub use workflow::{AuthWorkflow, Authenticated, WorkflowConfig};
