//! Validation Results
//!
//! A [`ValidationResult`] owns pooled storage for global messages and
//! path-addressed message groups. Ownership is the disposal discipline:
//! - `merge` consumes the child and releases its buffers after copying
//! - `dispose` consumes the result
//! - `Drop` releases whatever was never disposed
//!
//! Storage is handed back to the [`MessagePool`] exactly once.

pub mod message;
pub mod pool;

pub use message::Message;
pub use pool::MessagePool;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Messages recorded under one property path
#[derive(Debug)]
struct PropertyGroup {
    path: String,
    messages: Vec<Message>,
}

/// Mergeable, disposable container of rule violations
pub struct ValidationResult {
    global: Vec<Message>,
    groups: Vec<PropertyGroup>,
    index: HashMap<String, usize>,
    pool: Arc<MessagePool>,
    released: bool,
}

impl ValidationResult {
    pub fn new(pool: &Arc<MessagePool>) -> Self {
        Self::with_capacity(pool, 0)
    }

    /// Result sized for roughly `hint` property groups
    pub fn with_capacity(pool: &Arc<MessagePool>, hint: usize) -> Self {
        Self {
            global: pool.acquire(0),
            groups: Vec::with_capacity(hint),
            index: HashMap::with_capacity(hint),
            pool: Arc::clone(pool),
            released: false,
        }
    }

    /// True when no message was recorded anywhere
    pub fn success(&self) -> bool {
        self.message_count() == 0
    }

    /// Total number of messages, global and per path
    pub fn message_count(&self) -> usize {
        self.global.len() + self.groups.iter().map(|g| g.messages.len()).sum::<usize>()
    }

    pub fn global_messages(&self) -> &[Message] {
        &self.global
    }

    /// Path-addressed groups in the order their paths were first recorded
    pub fn properties(&self) -> impl Iterator<Item = (&str, &[Message])> {
        self.groups
            .iter()
            .filter(|g| !g.messages.is_empty())
            .map(|g| (g.path.as_str(), g.messages.as_slice()))
    }

    /// Messages under one path; empty when the path has none
    pub fn messages_for(&self, path: &str) -> &[Message] {
        self.index
            .get(path)
            .map(|&i| self.groups[i].messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_global(&mut self, message: Message) {
        self.global.push(message);
    }

    pub fn add_property(&mut self, path: &str, message: Message) {
        self.group_mut(path).push(message);
    }

    /// Append messages under a path. No group is created for an empty batch.
    pub fn extend_property(&mut self, path: &str, messages: impl IntoIterator<Item = Message>) {
        let mut messages = messages.into_iter().peekable();
        if messages.peek().is_none() {
            return;
        }
        self.group_mut(path).extend(messages);
    }

    /// Remove every message under a path
    pub fn clear_property(&mut self, path: &str) {
        if let Some(&i) = self.index.get(path) {
            self.groups[i].messages.clear();
        }
    }

    pub fn clear_global(&mut self) {
        self.global.clear();
    }

    /// Swap the messages under a path for `messages`
    pub fn replace_property(&mut self, path: &str, messages: impl IntoIterator<Item = Message>) {
        self.clear_property(path);
        self.extend_property(path, messages);
    }

    pub fn replace_global(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.global.clear();
        self.global.extend(messages);
    }

    /// Read-only path mapping, ordered by path
    pub fn property_map(&self) -> BTreeMap<&str, &[Message]> {
        self.properties().collect()
    }

    /// Copy `child` into this result and release the child's storage.
    ///
    /// With a prefix, child paths become `prefix.path` and child global
    /// messages land under `prefix`. Without one, the child is flattened
    /// into this level.
    pub fn merge(&mut self, mut child: ValidationResult, prefix: Option<&str>) {
        match prefix {
            Some(prefix) => self.extend_property(prefix, child.global.drain(..)),
            None => self.global.append(&mut child.global),
        }

        for group in child.groups.iter_mut() {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, group.path),
                None => group.path.clone(),
            };
            self.extend_property(&path, group.messages.drain(..));
        }

        child.dispose();
    }

    /// Merge with no prefix
    pub fn combine(&mut self, other: ValidationResult) {
        self.merge(other, None);
    }

    /// Owned snapshot for reporting and comparisons
    pub fn report(&self) -> ValidationReport {
        ValidationReport {
            success: self.success(),
            global: self.global.clone(),
            properties: self
                .properties()
                .map(|(path, messages)| (path.to_string(), messages.to_vec()))
                .collect(),
        }
    }

    /// Release pooled storage
    pub fn dispose(mut self) {
        self.release_storage();
    }

    fn group_mut(&mut self, path: &str) -> &mut Vec<Message> {
        let i = match self.index.get(path) {
            Some(&i) => i,
            None => {
                let i = self.groups.len();
                self.groups.push(PropertyGroup {
                    path: path.to_string(),
                    messages: self.pool.acquire(1),
                });
                self.index.insert(path.to_string(), i);
                i
            }
        };
        &mut self.groups[i].messages
    }

    fn release_storage(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        self.pool.release(std::mem::take(&mut self.global));
        for group in self.groups.drain(..) {
            self.pool.release(group.messages);
        }
        self.index.clear();
    }
}

impl Drop for ValidationResult {
    fn drop(&mut self) {
        self.release_storage();
    }
}

impl fmt::Debug for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationResult")
            .field("success", &self.success())
            .field("global", &self.global)
            .field("properties", &self.properties().collect::<Vec<_>>())
            .finish()
    }
}

/// Owned, serializable snapshot of a [`ValidationResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub success: bool,
    #[serde(default)]
    pub global: Vec<Message>,
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<Message>>,
}
