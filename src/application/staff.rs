use crate::domain::ports::LibraryStoreRef;
use crate::domain::user::{NewUser, User, UserId, validate_password};
use crate::error::{LibraryError, Result};
use tracing::{info, instrument, warn};

/// Maintains the staff accounts that operate the library.
pub struct UserService {
    store: LibraryStoreRef,
    hash_cost: u32,
}

impl UserService {
    pub fn new(store: LibraryStoreRef) -> Self {
        Self::with_hash_cost(store, bcrypt::DEFAULT_COST)
    }

    /// Uses `hash_cost` bcrypt rounds for new password hashes.
    pub fn with_hash_cost(store: LibraryStoreRef, hash_cost: u32) -> Self {
        Self { store, hash_cost }
    }

    /// Creates an active account. The username must not be taken.
    #[instrument(skip_all, fields(username = %user.username, role = %user.role), err)]
    pub async fn register(&self, user: &NewUser) -> Result<User> {
        user.validate()?;
        if self.store.find_user_by_username(&user.username).await?.is_some() {
            return Err(LibraryError::DuplicateUsername(user.username.clone()));
        }

        let hash = bcrypt::hash(&user.password, self.hash_cost)?;
        let stored = self
            .store
            .insert_user(&user.username, &hash, user.role)
            .await?;
        info!(user_id = %stored.id, "user registered");
        Ok(stored)
    }

    /// Returns the account matching `username` and `password`.
    ///
    /// Unknown usernames, wrong passwords and inactive accounts all fail with
    /// the same `InvalidCredentials` error.
    #[instrument(skip(self, password), err)]
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let Some(user) = self.store.find_user_by_username(username.trim()).await? else {
            return Err(LibraryError::InvalidCredentials);
        };
        if !user.is_active || !bcrypt::verify(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login rejected");
            return Err(LibraryError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Updates username, role and activity. The password hash is left as is.
    #[instrument(skip_all, fields(user_id = %user.id), err)]
    pub async fn update(&self, user: &User) -> Result<()> {
        user.validate()?;
        if let Some(existing) = self.store.find_user_by_username(&user.username).await? {
            if existing.id != user.id {
                return Err(LibraryError::DuplicateUsername(user.username.clone()));
            }
        }
        if !self.store.update_user(user).await? {
            return Err(LibraryError::UserNotFound(user.id));
        }
        Ok(())
    }

    #[instrument(skip(self, password), err)]
    pub async fn change_password(&self, id: UserId, password: &str) -> Result<()> {
        validate_password(password)?;
        let hash = bcrypt::hash(password, self.hash_cost)?;
        if !self.store.update_password_hash(id, &hash).await? {
            return Err(LibraryError::UserNotFound(id));
        }
        Ok(())
    }

    pub async fn deactivate(&self, id: UserId) -> Result<User> {
        let mut user = self
            .find(id)
            .await?
            .ok_or(LibraryError::UserNotFound(id))?;
        user.is_active = false;
        self.update(&user).await?;
        Ok(user)
    }

    pub async fn find(&self, id: UserId) -> Result<Option<User>> {
        self.store.find_user(id).await
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.store.list_users().await
    }
}
