//! OpenID Connect login relay
//!
//! The browser is sent to the identity provider by the login endpoint and
//! comes back to the callback endpoint with an authorization code. The
//! callback exchanges the code (or a posted refresh token) for a token set,
//! verifies the identity token against the provider's published keys, and
//! hands the raw identity token to the browser as the `oauth2-token` cookie.
//!
//! Module layout:
//! - [`discovery`]: provider metadata from `/.well-known/openid-configuration`
//! - [`state`]: anti-replay state values
//! - [`token`]: OAuth2 client settings and the token endpoint
//! - [`verifier`]: identity token verification
//! - [`authenticator`]: the shared, immutable authenticator
//! - [`handlers`]: the axum endpoints

pub mod authenticator;
pub mod discovery;
pub mod handlers;
pub mod state;
pub mod token;
pub mod verifier;

pub use authenticator::{Authenticator, AuthenticatorConfig, AuthenticatorOptions};
pub use handlers::routes;
