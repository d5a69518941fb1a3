// GitHub adapters.
// User and organization activity built from the REST API and a contributions service.

pub mod endpoints;
pub mod events;
pub mod org;
pub mod types;
pub mod user;

pub use endpoints::GitHubApi;
pub use org::{GitHubOrgAdapter, OrgQuery};
pub use types::*;
pub use user::{GitHubUserAdapter, UserQuery};

use crate::error::Result;

use super::check_handle;

/// Check a GitHub login (users and organizations share the rules).
pub(crate) fn check_login(login: &str, name: &str) -> Result<()> {
    check_handle(login, name, 39, |c| c.is_ascii_alphanumeric() || c == '-')
}
