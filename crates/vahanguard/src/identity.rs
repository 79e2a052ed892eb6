//! Account registry and session tracking.
//!
//! Accounts are kept in the `users` collection and the signed-in account in
//! the `currentUser` record. Authentication is an exact match on email plus a
//! secret check delegated to the configured [`SecretScheme`].

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{new_id, Account};
use crate::storage::{self, CollectionStore, CURRENT_USER, USERS};

/// How account secrets are stored and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretScheme {
    /// Stored as given and compared verbatim.
    #[default]
    Plaintext,
    /// Stored as a BLAKE3 digest.
    Blake3,
}

const BLAKE3_PREFIX: &str = "blake3:";

impl SecretScheme {
    /// Produce the stored form of `secret`.
    #[must_use]
    pub fn seal(self, secret: &str) -> String {
        match self {
            Self::Plaintext => secret.to_string(),
            Self::Blake3 => format!("{BLAKE3_PREFIX}{}", blake3::hash(secret.as_bytes()).to_hex()),
        }
    }

    /// Check `secret` against a stored value.
    #[must_use]
    pub fn verify(self, secret: &str, stored: &str) -> bool {
        match self {
            Self::Plaintext => secret == stored,
            Self::Blake3 => stored
                .strip_prefix(BLAKE3_PREFIX)
                .and_then(|hex| blake3::Hash::from_hex(hex).ok())
                // Hash equality is constant-time
                .is_some_and(|expected| blake3::hash(secret.as_bytes()) == expected),
        }
    }
}

impl std::fmt::Display for SecretScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plaintext => write!(f, "plaintext"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"))
}

/// Holds registered accounts and the current session.
#[derive(Debug)]
pub struct IdentityStore {
    store: Arc<dyn CollectionStore>,
    scheme: SecretScheme,
    accounts: Mutex<Vec<Account>>,
}

impl IdentityStore {
    /// Load the account collection from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn open(store: Arc<dyn CollectionStore>, scheme: SecretScheme) -> Result<Self> {
        let accounts: Vec<Account> = storage::load_collection(store.as_ref(), USERS)?;
        debug!(count = accounts.len(), "Loaded accounts");
        Ok(Self {
            store,
            scheme,
            accounts: Mutex::new(accounts),
        })
    }

    fn accounts(&self) -> Result<MutexGuard<'_, Vec<Account>>> {
        self.accounts
            .lock()
            .map_err(|_| Error::internal("account list lock poisoned"))
    }

    /// Register a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name or secret or a malformed
    /// email, [`Error::DuplicateEmail`] if the email is taken, or a storage error.
    pub fn signup(&self, name: &str, email: &str, secret: &str) -> Result<Account> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "a name is required"));
        }
        if !email_pattern().is_match(email) {
            return Err(Error::validation("email", "a valid email address is required"));
        }
        if secret.is_empty() {
            return Err(Error::validation("password", "a password is required"));
        }

        let account = {
            let mut accounts = self.accounts()?;
            if accounts.iter().any(|a| a.email == email) {
                return Err(Error::DuplicateEmail {
                    email: email.to_string(),
                });
            }

            let account = Account {
                id: new_id(),
                name: name.to_string(),
                email: email.to_string(),
                secret: self.scheme.seal(secret),
            };
            accounts.push(account.clone());
            if let Err(e) = storage::save_collection(self.store.as_ref(), USERS, &accounts) {
                accounts.pop();
                return Err(e);
            }
            account
        };

        storage::save_record(self.store.as_ref(), CURRENT_USER, &account)?;
        info!(account = %account.id, "Account created");
        Ok(account)
    }

    /// Sign in with an email and secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if no account matches, or a storage error.
    pub fn login(&self, email: &str, secret: &str) -> Result<Account> {
        let email = email.trim();
        let account = self
            .accounts()?
            .iter()
            .find(|a| a.email == email && self.scheme.verify(secret, &a.secret))
            .cloned()
            .ok_or(Error::InvalidCredentials)?;

        storage::save_record(self.store.as_ref(), CURRENT_USER, &account)?;
        info!(account = %account.id, "Signed in");
        Ok(account)
    }

    /// End the current session. Signing out while signed out is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the session record cannot be removed.
    pub fn logout(&self) -> Result<()> {
        if self.store.remove(CURRENT_USER)? {
            info!("Signed out");
        }
        Ok(())
    }

    /// The signed-in account, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session record cannot be read.
    pub fn current(&self) -> Result<Option<Account>> {
        storage::load_record(self.store.as_ref(), CURRENT_USER)
    }

    /// The signed-in account, or [`Error::Unauthenticated`].
    ///
    /// # Errors
    ///
    /// Returns an error if nobody is signed in or the session cannot be read.
    pub fn require_current(&self) -> Result<Account> {
        self.current()?.ok_or(Error::Unauthenticated)
    }

    /// Look up an account by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the account list lock is poisoned.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.accounts()?.iter().find(|a| a.id == id).cloned())
    }

    /// Number of registered accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the account list lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.accounts()?.len())
    }

    /// Whether no account has been registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the account list lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
