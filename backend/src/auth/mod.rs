//! Role-based access and routing.
//!
//! Resolution runs in a fixed order: the session is resolved, the role is
//! classified, and then the request is redirected or allowed to continue.
//! Every step takes the request context explicitly, so each function can be
//! exercised without a running server.

pub mod extract;
pub mod guards;
pub mod provider;
pub mod redirect;
pub mod roles;
pub mod session;

pub use extract::{AdminUser, CurrentUser, GuardRejection, ManagementUser};
pub use guards::{Access, Requirement, require, require_admin, require_auth, require_management};
pub use provider::{PkceChallenge, ProviderUser, SupabaseAuthClient};
pub use redirect::{landing_for, root_destination};
pub use roles::{classify, home_route_for_role};
pub use session::{
    Claims, JwtSessionResolver, RequestContext, SessionResolver, SessionState,
    SupabaseSessionResolver,
};
