//! File-backed source: `<dir>/<account>.json` holding `{ "private": bool, "followers": [...] }`.

use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{AccountHandle, EntitySource, Page, Session, SessionContext};
use crate::error::{HarvestError, HarvestResult};
use crate::types::Entity;

#[derive(Debug, Deserialize)]
struct FeedFile {
    #[serde(default)]
    private: bool,
    #[serde(default)]
    followers: Vec<Entity>,
}

pub struct JsonFeedSource {
    dir: PathBuf,
    page_size: usize,
    authenticated: bool,
    loaded: Mutex<HashMap<String, Arc<Vec<Entity>>>>,
}

impl JsonFeedSource {
    pub fn new(dir: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            dir: dir.into(),
            page_size: page_size.max(1),
            authenticated: false,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn feed_path(&self, account: &str) -> PathBuf {
        self.dir.join(format!("{account}.json"))
    }

    fn read_feed(&self, account: &str) -> HarvestResult<FeedFile> {
        let path = self.feed_path(account);
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => HarvestError::UpstreamNotFound {
                account: account.to_string(),
            },
            _ => HarvestError::ConnectionBroken(format!("read {}: {e}", path.display())),
        })?;
        serde_json::from_str(&text).map_err(|e| {
            HarvestError::ConnectionBroken(format!("parse {}: {e}", path.display()))
        })
    }

    fn followers(&self, account: &str) -> HarvestResult<Arc<Vec<Entity>>> {
        if let Some(list) = self
            .loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
        {
            return Ok(Arc::clone(list));
        }
        let feed = self.read_feed(account)?;
        let list = Arc::new(feed.followers);
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.to_string(), Arc::clone(&list));
        Ok(list)
    }
}

impl EntitySource for JsonFeedSource {
    fn authenticate(&mut self, context: &SessionContext) -> HarvestResult<Session> {
        self.authenticated = context.login.is_some() && context.password.is_some();
        Ok(Session {
            login: context.login.clone(),
            authenticated: self.authenticated,
        })
    }

    fn resolve_account(&self, name: &str) -> HarvestResult<AccountHandle> {
        let feed = self.read_feed(name)?;
        if feed.private && !self.authenticated {
            return Err(HarvestError::UpstreamAuthRequired {
                account: name.to_string(),
            });
        }
        debug!("Feed {}: {} followers", name, feed.followers.len());
        let total = feed.followers.len() as u64;
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(feed.followers));
        Ok(AccountHandle {
            name: name.to_string(),
            follower_total: Some(total),
        })
    }

    fn fetch_page(&self, handle: &AccountHandle, cursor: Option<&str>) -> HarvestResult<Page> {
        let followers = self.followers(&handle.name)?;
        let offset = match cursor {
            None => 0,
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| HarvestError::ConnectionBroken(format!("bad cursor '{c}'")))?,
        };
        let end = (offset + self.page_size).min(followers.len());
        Ok(Page {
            entities: followers
                .get(offset..end)
                .map(<[Entity]>::to_vec)
                .unwrap_or_default(),
            next_cursor: (end < followers.len()).then(|| end.to_string()),
        })
    }
}
