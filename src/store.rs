//! User persistence.
//!
//! Two records, mirroring the browser storage layout: the full users array under
//! `freddyUsers` and the logged-in user's snapshot under `freddyUser`. Every save
//! overwrites the whole record. There is no schema version and no migration.

use crate::user::User;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const USERS_KEY: &str = "freddyUsers";
pub const SESSION_KEY: &str = "freddyUser";

pub trait UserStore: std::fmt::Debug {
    fn load_users(&self) -> Result<Vec<User>, StoreError>;

    fn save_users(&mut self, users: &[User]) -> Result<(), StoreError>;

    fn load_session(&self) -> Result<Option<User>, StoreError>;

    /// `None` clears the session record.
    fn save_session(&mut self, user: Option<&User>) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    users: Vec<User>,
    session: Option<User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        Self { users, session: None }
    }
}

impl UserStore for MemoryStore {
    fn load_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.clone())
    }

    fn save_users(&mut self, users: &[User]) -> Result<(), StoreError> {
        self.users = users.to_vec();
        Ok(())
    }

    fn load_session(&self) -> Result<Option<User>, StoreError> {
        Ok(self.session.clone())
    }

    fn save_session(&mut self, user: Option<&User>) -> Result<(), StoreError> {
        self.session = user.cloned();
        Ok(())
    }
}

/// One pretty-printed JSON file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl UserStore for JsonFileStore {
    fn load_users(&self) -> Result<Vec<User>, StoreError> {
        match self.read_key(USERS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_users(&mut self, users: &[User]) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(users)?;
        fs::write(self.path_for(USERS_KEY), raw)?;
        Ok(())
    }

    fn load_session(&self) -> Result<Option<User>, StoreError> {
        match self.read_key(SESSION_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(None),
        }
    }

    fn save_session(&mut self, user: Option<&User>) -> Result<(), StoreError> {
        let path = self.path_for(SESSION_KEY);
        match user {
            Some(user) => fs::write(path, serde_json::to_string_pretty(user)?)?,
            None => match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt stored record: {0}")]
    Serde(#[from] serde_json::Error),
}

/// MemoryStore wrapper whose saves can be made to fail. `user_saves_left` of
/// `None` means unlimited. Clones share state, so a test keeps one handle and
/// gives the other to the exchange.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakyStore {
    pub inner: std::rc::Rc<std::cell::RefCell<MemoryStore>>,
    pub user_saves_left: std::rc::Rc<std::cell::Cell<Option<u32>>>,
    pub fail_session: std::rc::Rc<std::cell::Cell<bool>>,
}

#[cfg(test)]
impl FlakyStore {
    fn refuse() -> StoreError {
        StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}

#[cfg(test)]
impl UserStore for FlakyStore {
    fn load_users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.borrow().load_users()
    }

    fn save_users(&mut self, users: &[User]) -> Result<(), StoreError> {
        match self.user_saves_left.get() {
            Some(0) => return Err(Self::refuse()),
            Some(n) => self.user_saves_left.set(Some(n - 1)),
            None => {}
        }
        self.inner.borrow_mut().save_users(users)
    }

    fn load_session(&self) -> Result<Option<User>, StoreError> {
        self.inner.borrow().load_session()
    }

    fn save_session(&mut self, user: Option<&User>) -> Result<(), StoreError> {
        if self.fail_session.get() {
            return Err(Self::refuse());
        }
        self.inner.borrow_mut().save_session(user)
    }
}
