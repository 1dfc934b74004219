//! Bearer-token authentication against the Las Aves backend.
//!
//! Dual-token system: a short-lived access token sent as `Authorization:
//! Bearer` on every API call and a long-lived refresh token exchanged at
//! `/auth/refresh` for a new pair. Access tokens are renewed transparently by
//! [`AuthService::authenticated_fetch`], with at most one refresh in flight.

mod backend;
mod coordinator;
mod request;
mod types;

pub use backend::Backend;
pub use coordinator::{AuthService, CoordinatorOptions};
pub use request::{FormField, RequestBody, RequestOptions};
pub use types::{LoginCredentials, LoginResponse, RefreshResponse, SessionTokens, Usuario};
