// Gateway module for auth - follows the Train Station Pattern
// All external access must go through this gateway

mod guard;
mod navigator;
mod role;
mod session;
mod token;

pub use guard::{Capability, GuardOutcome, RouteGuard};
pub use navigator::{LogNavigator, Navigator, Route};
pub use role::Role;
pub use session::{Session, SessionManager, SessionState};
pub use token::{decode_claims, is_token_valid, TokenClaims};

#[cfg(test)]
pub(crate) use navigator::MockNavigator;
#[cfg(test)]
pub(crate) use token::make_token;
