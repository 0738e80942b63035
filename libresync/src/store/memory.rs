use super::{DigestRecord, HistoryEntry, ImageStore};
use crate::error::{Result, ResyncError};
use crate::reference::ImageIdentity;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A mutating call received by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Pull(String),
    Tag { source: String, target: String },
    RemoveTag(String),
}

#[derive(Debug, Clone, Default)]
struct StoredImage {
    record: DigestRecord,
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Default)]
struct State {
    local: HashMap<String, StoredImage>,
    remote: HashMap<String, StoredImage>,
    failing: HashSet<(String, String)>,
    calls: Vec<StoreCall>,
}

/// [`ImageStore`] keeping images in memory.
///
/// Images are keyed by `<full reference>:<tag>`. Pulling copies the image
/// published under the same key into the local set. Every mutating call is
/// recorded, including the ones configured to fail.
///
/// # Examples
///
/// ```
/// use libresync::reference::ImageIdentity;
/// use libresync::store::{DigestRecord, ImageStore, MemoryStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// store.insert_local("redis:6", DigestRecord::default(), Vec::new());
///
/// let image = ImageIdentity::parse("redis:6")?;
/// assert!(store.inspect(&image).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores a local image under `reference`.
    pub fn insert_local(&self, reference: &str, record: DigestRecord, history: Vec<HistoryEntry>) {
        self.state()
            .local
            .insert(reference.to_string(), StoredImage { record, history });
    }

    /// Sets what pulling `reference` produces.
    pub fn publish(&self, reference: &str, record: DigestRecord, history: Vec<HistoryEntry>) {
        self.state()
            .remote
            .insert(reference.to_string(), StoredImage { record, history });
    }

    /// Makes `operation` (`inspect`, `pull`, `tag`, `remove` or `history`)
    /// fail for `reference`.
    pub fn fail_on(&self, operation: &str, reference: &str) {
        self.state()
            .failing
            .insert((operation.to_string(), reference.to_string()));
    }

    /// Returns true when `reference` is present locally.
    pub fn contains(&self, reference: &str) -> bool {
        self.state().local.contains_key(reference)
    }

    /// Returns every mutating call received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    fn check(state: &State, operation: &str, reference: &str) -> Result<()> {
        if state
            .failing
            .contains(&(operation.to_string(), reference.to_string()))
        {
            return Err(ResyncError::local_store(operation, reference, "injected failure"));
        }
        Ok(())
    }

    fn local<'a>(state: &'a State, operation: &str, reference: &str) -> Result<&'a StoredImage> {
        state
            .local
            .get(reference)
            .ok_or_else(|| ResyncError::local_store(operation, reference, "No such image"))
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn inspect(&self, image: &ImageIdentity) -> Result<Option<DigestRecord>> {
        let reference = image.to_string();
        let state = self.state();
        Self::check(&state, "inspect", &reference)?;
        Ok(state.local.get(&reference).map(|image| image.record.clone()))
    }

    async fn pull(&self, image: &ImageIdentity) -> Result<()> {
        let reference = image.to_string();
        let mut state = self.state();
        state.calls.push(StoreCall::Pull(reference.clone()));
        Self::check(&state, "pull", &reference)?;

        let published = state
            .remote
            .get(&reference)
            .cloned()
            .ok_or_else(|| ResyncError::local_store("pull", &reference, "manifest unknown"))?;
        state.local.insert(reference, published);
        Ok(())
    }

    async fn tag(&self, image: &ImageIdentity, new_tag: &str) -> Result<()> {
        let reference = image.to_string();
        let target = image.with_tag(new_tag).to_string();
        let mut state = self.state();
        state.calls.push(StoreCall::Tag {
            source: reference.clone(),
            target: target.clone(),
        });
        Self::check(&state, "tag", &reference)?;

        let stored = Self::local(&state, "tag", &reference)?.clone();
        state.local.insert(target, stored);
        Ok(())
    }

    async fn remove_tag(&self, image: &ImageIdentity) -> Result<()> {
        let reference = image.to_string();
        let mut state = self.state();
        state.calls.push(StoreCall::RemoveTag(reference.clone()));
        Self::check(&state, "remove", &reference)?;

        state
            .local
            .remove(&reference)
            .map(|_| ())
            .ok_or_else(|| ResyncError::local_store("remove", reference, "No such image"))
    }

    async fn history(&self, image: &ImageIdentity) -> Result<Vec<HistoryEntry>> {
        let reference = image.to_string();
        let state = self.state();
        Self::check(&state, "history", &reference)?;
        Ok(Self::local(&state, "history", &reference)?.history.clone())
    }
}
