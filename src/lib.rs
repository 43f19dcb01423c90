//! # Limen
//!
//! `limen` is a small account service: user registration with email
//! confirmation, login, password change and reset, email change, and a
//! bitmask role/permission model.
//!
//! ## Tokens
//!
//! Confirmation, password-reset, and email-change links carry a **signed,
//! purpose-tagged token**: an HMAC over JSON claims with subject, purpose,
//! and expiry. A token minted for one purpose never verifies for another, so
//! a confirmation link cannot be replayed as a reset link.
//!
//! ## Roles & permissions
//!
//! Capabilities are bits in a mask; roles (`User`, `Moderator`,
//! `Administrator`) OR them together. Exactly one role is the default for
//! new accounts, and the catalog is reconciled idempotently at bootstrap.
//!
//! ## Confirmation gate
//!
//! A signed-in but unconfirmed account may only reach confirmation-related
//! endpoints; everything else answers 403 until the emailed token is
//! redeemed.

pub mod api;
pub mod cli;
pub mod identity;
