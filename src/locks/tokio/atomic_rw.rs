use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::sync::RwLockReadGuard;
use tokio::sync::RwLockWriteGuard;

use super::LockAcquisition;

/// An `Arc<RwLock<T>>` wrapper to make data thread-safe and easy to work with.
///
/// Lock acquisitions are traced under the lock's name, if it has one.
///
/// # Examples
/// ```
/// # use fcminer_core::locks::tokio::AtomicRw;
/// struct Wallet {
///     balance: u64,
/// };
/// # tokio_test::block_on(async {
/// let wallet = AtomicRw::from(Wallet { balance: 0 });
/// wallet.lock_mut(|w| w.balance += 3_000).await;
/// assert_eq!(3_000, wallet.lock(|w| w.balance).await);
/// # })
/// ```
#[derive(Debug)]
pub struct AtomicRw<T> {
    inner: Arc<RwLock<T>>,
    name: Option<&'static str>,
}

impl<T: Default> Default for AtomicRw<T> {
    fn default() -> Self {
        Self::from(T::default())
    }
}

impl<T> From<T> for AtomicRw<T> {
    #[inline]
    fn from(t: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(t)),
            name: None,
        }
    }
}

impl<T> From<(T, &'static str)> for AtomicRw<T> {
    /// Create with a name that shows up in lock traces.
    #[inline]
    fn from(v: (T, &'static str)) -> Self {
        Self {
            inner: Arc::new(RwLock::new(v.0)),
            name: Some(v.1),
        }
    }
}

impl<T> Clone for AtomicRw<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name: self.name,
        }
    }
}

impl<T> AtomicRw<T> {
    fn trace(&self, acquisition: LockAcquisition) {
        if let Some(name) = self.name {
            tracing::trace!(lock = name, %acquisition, "acquired RwLock");
        }
    }

    /// Acquire read lock and return an `RwLockReadGuard`
    pub async fn lock_guard(&self) -> RwLockReadGuard<'_, T> {
        let guard = self.inner.read().await;
        self.trace(LockAcquisition::Read);
        guard
    }

    /// Acquire write lock and return an `RwLockWriteGuard`
    ///
    /// # Examples
    /// ```
    /// # use fcminer_core::locks::tokio::AtomicRw;
    /// # tokio_test::block_on(async {
    /// let counter = AtomicRw::from(0u32);
    /// *counter.lock_guard_mut().await += 1;
    /// assert_eq!(1, *counter.lock_guard().await);
    /// # })
    /// ```
    pub async fn lock_guard_mut(&self) -> RwLockWriteGuard<'_, T> {
        let guard = self.inner.write().await;
        self.trace(LockAcquisition::Write);
        guard
    }

    /// Immutably access the data of type `T` in a closure and return a result
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.lock_guard().await;
        f(&guard)
    }

    /// Mutably access the data of type `T` in a closure and return a result
    pub async fn lock_mut<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.lock_guard_mut().await;
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    // Verify (compile-time) that lock() and lock_mut() accept FnOnce closures.
    async fn mutable_assignment() {
        let rate: AtomicRw<String> = AtomicRw::from((String::from("0.003"), "rate"));

        let mut copied = String::new();
        rate.lock(|r| copied = r.clone()).await;
        rate.lock_mut(|r| r.push('5')).await;

        assert_eq!("0.003", copied);
        assert_eq!("0.0035", rate.lock(|r| r.clone()).await);
    }

    #[tokio::test]
    async fn clones_share_data() {
        let a = AtomicRw::from(1u8);
        let b = a.clone();
        b.lock_mut(|v| *v = 7).await;
        assert_eq!(7, *a.lock_guard().await);
    }
}
