use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::helpers::{hash_password, new_id};
use crate::models::models::{User, UserPatch};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Access to the persisted user collection. Lookups are first-match in
/// insertion order. Uniqueness is the caller's job.
pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    fn find_by_accountname(&self, accountname: &str) -> Result<Option<User>>;
    fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    fn insert(&self, user: User) -> Result<()>;
    /// Merges `patch` into the record and persists it. `None` for an unknown id.
    fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>>;
    fn count(&self) -> Result<usize>;
}

/// On-disk layout: `{"users": [...]}` plus any other collections, which are
/// written back untouched.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct Document {
    #[serde(default)]
    users: Vec<User>,
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

fn find_in(users: &[User], pred: impl Fn(&User) -> bool) -> Option<User> {
    users.iter().find(|u| pred(u)).cloned()
}

fn update_in(users: &mut [User], id: &str, patch: UserPatch) -> Option<User> {
    let user = users.iter_mut().find(|u| u.id == id)?;
    patch.apply(user);
    Some(user.clone())
}

// === JSON file store ===

pub struct JsonFileStore {
    path: PathBuf,
    doc: RwLock<Document>,
}

impl JsonFileStore {
    /// Loads the document at `path`, creating `{"users": []}` if the file
    /// does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Document>(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No datastore at {}, creating an empty one", path.display());
                let doc = Document::default();
                write_document(&path, &doc)?;
                doc
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!("Loaded {} users from {}", doc.users.len(), path.display());
        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> Result<T> {
        let doc = self.doc.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&*doc))
    }

    /// Applies `f` and rewrites the file. The in-memory mirror is restored
    /// if the write fails.
    fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> T) -> Result<T> {
        let mut doc = self.doc.write().map_err(|_| StoreError::Poisoned)?;
        let snapshot = doc.users.clone();
        let out = f(&mut *doc);
        if let Err(e) = write_document(&self.path, &doc) {
            warn!("Datastore write failed, rolling back: {}", e);
            doc.users = snapshot;
            return Err(e);
        }
        Ok(out)
    }
}

fn write_document(path: &Path, doc: &Document) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl UserStore for JsonFileStore {
    fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.read(|d| find_in(&d.users, |u| u.email == email))
    }

    fn find_by_accountname(&self, accountname: &str) -> Result<Option<User>> {
        self.read(|d| find_in(&d.users, |u| u.accountname == accountname))
    }

    fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        self.read(|d| find_in(&d.users, |u| u.id == id))
    }

    fn insert(&self, user: User) -> Result<()> {
        self.mutate(|d| d.users.push(user))
    }

    fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>> {
        self.mutate(|d| update_in(&mut d.users, id, patch))
    }

    fn count(&self) -> Result<usize> {
        self.read(|d| d.users.len())
    }
}

// === In-memory store ===

/// Same semantics as [`JsonFileStore`] without a backing file.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryStore {
    fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned)?;
        Ok(find_in(&users, |u| u.email == email))
    }

    fn find_by_accountname(&self, accountname: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned)?;
        Ok(find_in(&users, |u| u.accountname == accountname))
    }

    fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned)?;
        Ok(find_in(&users, |u| u.id == id))
    }

    fn insert(&self, user: User) -> Result<()> {
        let mut users = self.users.write().map_err(|_| StoreError::Poisoned)?;
        users.push(user);
        Ok(())
    }

    fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>> {
        let mut users = self.users.write().map_err(|_| StoreError::Poisoned)?;
        Ok(update_in(&mut users, id, patch))
    }

    fn count(&self) -> Result<usize> {
        let users = self.users.read().map_err(|_| StoreError::Poisoned)?;
        Ok(users.len())
    }
}

// === Demo data ===

const DEMO_ACCOUNTS: [(&str, &str); 3] = [
    ("test", "Test user intro"),
    ("alice", "Hello, I'm Alice!"),
    ("bob", "Bob's corner of the internet"),
];

/// Seeds the demo accounts (password = accountname) and makes `test` follow
/// `bob`. Safe to run on every startup.
pub fn init_test_data(store: &dyn UserStore) -> anyhow::Result<()> {
    for (name, intro) in DEMO_ACCOUNTS {
        if store.find_by_accountname(name)?.is_some() {
            continue;
        }
        store.insert(User {
            id: new_id(),
            username: name.to_string(),
            email: format!("{}@example.com", name),
            accountname: name.to_string(),
            intro: intro.to_string(),
            image: String::new(),
            password: hash_password(name)?,
            following: Vec::new(),
            follower: Vec::new(),
        })?;
        info!("Seeded demo account {}", name);
    }

    let (Some(test), Some(bob)) = (
        store.find_by_accountname("test")?,
        store.find_by_accountname("bob")?,
    ) else {
        return Ok(());
    };

    if !test.following.contains(&bob.id) {
        let mut following = test.following;
        following.push(bob.id.clone());
        store.update(&test.id, UserPatch::following(following))?;
    }
    if !bob.follower.contains(&test.id) {
        let mut follower = bob.follower;
        follower.push(test.id.clone());
        store.update(&bob.id, UserPatch::follower(follower))?;
    }

    Ok(())
}
