//! # mailtree-sasl
//!
//! Client side of the SASL mechanisms an IMAP client needs: PLAIN, LOGIN,
//! OAUTHBEARER and XOAUTH2.
//!
//! An [`Exchange`] produces the base64 messages for `AUTHENTICATE`, either
//! as a SASL-IR initial response or as answers to `+` challenges.
//!
//! ```
//! use mailtree_sasl::{Credentials, Mechanism};
//!
//! let creds = Credentials::token("user@example.com", "ya29.a0");
//! let mut exchange = Mechanism::OAuthBearer.start(&creds)?;
//! let initial = exchange.initial_response();
//! assert!(initial.is_some());
//! # Ok::<(), mailtree_sasl::Error>(())
//! ```

mod error;
mod mechanism;
pub mod sasl;

pub use error::{Error, Result};
pub use mechanism::{Credentials, Exchange, Mechanism};
