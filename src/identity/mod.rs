//! Identity and authorization core.
//!
//! Everything that decides who a request is and what it may do lives here:
//! password hashing, the bitmask permission model, purpose-tagged signed
//! tokens, the persistence boundary, the session and mail collaborator
//! traits, and the auth workflow that orchestrates them. The HTTP layer in
//! `crate::api` is glue over this module and makes no identity decisions of
//! its own.

pub mod mail;
pub mod password;
pub mod permission;
pub mod principal;
pub mod session;
pub mod store;
pub mod token;
pub mod workflow;

pub use mail::{EmailMessage, EmailSender, LogEmailSender};
pub use password::{hash_password, verify_password};
pub use permission::{role_table, Permission, Role};
pub use principal::{AuthenticatedUser, Principal};
pub use session::{InMemorySessions, Session, SessionLayer};
pub use store::{
    reconcile_roles, IdentityStore, MemoryIdentityStore, NewUser, PgIdentityStore, StoreError,
    User,
};
pub use token::{TokenCodec, TokenError, TokenPurpose, DEFAULT_TOKEN_TTL_SECONDS};
pub use workflow::{
    confirmation_gate, ActionClass, AuthError, AuthWorkflow, ConfirmOutcome, GateDecision,
    LoginSuccess,
};
