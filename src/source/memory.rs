//! In-memory source with scripted faults. Offline runs and harvester tests use it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{AccountHandle, EntitySource, Page, Session, SessionContext};
use crate::error::{HarvestError, HarvestResult};
use crate::types::Entity;

/// Failure injected at a page boundary; each one fires once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    RateLimited(Option<Duration>),
    ConnectionBroken,
}

struct Account {
    entities: Vec<Entity>,
    private: bool,
}

struct ScriptedFault {
    account: String,
    offset: usize,
    fault: Fault,
}

pub struct MemorySource {
    page_size: usize,
    accounts: HashMap<String, Account>,
    faults: Mutex<Vec<ScriptedFault>>,
    authenticated: bool,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            accounts: HashMap::new(),
            faults: Mutex::new(Vec::new()),
            authenticated: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_account(mut self, name: &str, entities: Vec<Entity>) -> Self {
        self.accounts.insert(
            name.to_string(),
            Account {
                entities,
                private: false,
            },
        );
        self
    }

    /// Readable only after a successful [`EntitySource::authenticate`].
    pub fn with_private_account(mut self, name: &str, entities: Vec<Entity>) -> Self {
        self.accounts.insert(
            name.to_string(),
            Account {
                entities,
                private: true,
            },
        );
        self
    }

    /// Fail the fetch of `account`'s page that starts at entity `offset`, once.
    pub fn with_fault(self, account: &str, offset: usize, fault: Fault) -> Self {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ScriptedFault {
                account: account.to_string(),
                offset,
                fault,
            });
        self
    }

    /// Page fetches attempted so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn take_fault(&self, account: &str, offset: usize) -> Option<Fault> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let idx = faults
            .iter()
            .position(|f| f.account == account && f.offset == offset)?;
        Some(faults.remove(idx).fault)
    }
}

impl EntitySource for MemorySource {
    fn authenticate(&mut self, context: &SessionContext) -> HarvestResult<Session> {
        self.authenticated = context.login.is_some() && context.password.is_some();
        Ok(Session {
            login: context.login.clone(),
            authenticated: self.authenticated,
        })
    }

    fn resolve_account(&self, name: &str) -> HarvestResult<AccountHandle> {
        let account = self
            .accounts
            .get(name)
            .ok_or_else(|| HarvestError::UpstreamNotFound {
                account: name.to_string(),
            })?;
        if account.private && !self.authenticated {
            return Err(HarvestError::UpstreamAuthRequired {
                account: name.to_string(),
            });
        }
        Ok(AccountHandle {
            name: name.to_string(),
            follower_total: Some(account.entities.len() as u64),
        })
    }

    fn fetch_page(&self, handle: &AccountHandle, cursor: Option<&str>) -> HarvestResult<Page> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let account = self
            .accounts
            .get(&handle.name)
            .ok_or_else(|| HarvestError::UpstreamNotFound {
                account: handle.name.clone(),
            })?;
        let offset = match cursor {
            None => 0,
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| HarvestError::ConnectionBroken(format!("bad cursor '{c}'")))?,
        };
        match self.take_fault(&handle.name, offset) {
            Some(Fault::RateLimited(retry_after)) => {
                return Err(HarvestError::RateLimited { retry_after });
            }
            Some(Fault::ConnectionBroken) => {
                return Err(HarvestError::ConnectionBroken(format!(
                    "scripted break at {}:{offset}",
                    handle.name
                )));
            }
            None => {}
        }
        let end = (offset + self.page_size).min(account.entities.len());
        let entities = account
            .entities
            .get(offset..end)
            .map(<[Entity]>::to_vec)
            .unwrap_or_default();
        Ok(Page {
            entities,
            next_cursor: (end < account.entities.len()).then(|| end.to_string()),
        })
    }
}
