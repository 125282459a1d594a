use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::MutexGuard;

use super::LockAcquisition;

/// An `Arc<Mutex<T>>` wrapper to make data thread-safe and easy to work with.
///
/// # Example
/// ```
/// # use fcminer_core::locks::tokio::AtomicMutex;
/// struct Flushes {
///     count: u16,
/// };
/// # tokio_test::block_on(async {
/// let flushes = AtomicMutex::from(Flushes { count: 0 });
/// flushes.lock_mut(|f| f.count += 1).await;
/// assert_eq!(1, flushes.lock(|f| f.count).await);
/// # })
/// ```
#[derive(Debug)]
pub struct AtomicMutex<T> {
    inner: Arc<Mutex<T>>,
    name: Option<&'static str>,
}

impl<T: Default> Default for AtomicMutex<T> {
    fn default() -> Self {
        Self::from(T::default())
    }
}

impl<T> From<T> for AtomicMutex<T> {
    #[inline]
    fn from(t: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(t)),
            name: None,
        }
    }
}

impl<T> From<(T, &'static str)> for AtomicMutex<T> {
    #[inline]
    fn from(v: (T, &'static str)) -> Self {
        Self {
            inner: Arc::new(Mutex::new(v.0)),
            name: Some(v.1),
        }
    }
}

impl<T> Clone for AtomicMutex<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name: self.name,
        }
    }
}

impl<T> AtomicMutex<T> {
    /// Acquire lock and return a `MutexGuard`
    pub async fn lock_guard_mut(&self) -> MutexGuard<'_, T> {
        let guard = self.inner.lock().await;
        if let Some(name) = self.name {
            tracing::trace!(lock = name, acquisition = %LockAcquisition::Write, "acquired Mutex");
        }
        guard
    }

    /// Immutably access the data of type `T` in a closure and return a result
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.lock_guard_mut().await;
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
    async fn guard_serializes_writers() {
        let counter: AtomicMutex<u32> = AtomicMutex::from((0u32, "counter"));
        let mut handles = vec![];
        for _ in 0..8 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let mut guard = counter.lock_guard_mut().await;
                let seen = *guard;
                tokio::task::yield_now().await;
                *guard = seen + 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(8, counter.lock(|c| *c).await);
    }
}
