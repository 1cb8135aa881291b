//! Entity source: the paginated feed the harvester pulls from.
//!
//! The core only needs account resolution and `fetch_page(cursor)`, plus the typed failures in
//! [`HarvestError`](crate::error::HarvestError): `UpstreamAuthRequired`, `UpstreamNotFound`,
//! `RateLimited`, `ConnectionBroken`.

pub mod json_feed;
pub mod memory;

pub use json_feed::JsonFeedSource;
pub use memory::MemorySource;

use crate::error::HarvestResult;
use crate::types::Entity;

/// Credentials handed to [`EntitySource::authenticate`]. Acquiring them is the caller's business.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    pub login: Option<String>,
    pub password: Option<String>,
}

/// Result of authentication. `authenticated` decides whether private accounts can be read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub login: Option<String>,
    pub authenticated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountHandle {
    pub name: String,
    /// Follower count the source reported for the account, when known.
    pub follower_total: Option<u64>,
}

/// Opaque "how far" marker for pagination.
pub type PageCursor = String;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub entities: Vec<Entity>,
    /// None on the last page.
    pub next_cursor: Option<PageCursor>,
}

pub trait EntitySource: Send + Sync {
    /// Default: anonymous session, accepted as-is.
    fn authenticate(&mut self, context: &SessionContext) -> HarvestResult<Session> {
        Ok(Session {
            login: context.login.clone(),
            authenticated: false,
        })
    }

    fn resolve_account(&self, name: &str) -> HarvestResult<AccountHandle>;

    /// Page starting at `cursor` (None: first page).
    fn fetch_page(&self, handle: &AccountHandle, cursor: Option<&str>) -> HarvestResult<Page>;
}
