//! In-flight call de-duplication.
//! Concurrent callers with the same key await one shared computation; the
//! entry is dropped as soon as the computation finishes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

pub struct InFlight<T> {
    calls: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync> InFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` unless an identical call is already in flight, in which case
    /// wait for its result. The flag is true when the result came from
    /// another caller's computation.
    ///
    /// If the caller driving the computation is dropped, one of the waiters
    /// takes over with its own `f`.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> (T, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = {
            let mut calls = self.calls.lock();
            Arc::clone(calls.entry(key.to_string()).or_default())
        };

        let mut ran = false;
        let value = cell
            .get_or_init(|| {
                ran = true;
                f()
            })
            .await
            .clone();

        {
            let mut calls = self.calls.lock();
            if calls.get(key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                calls.remove(key);
            }
        }

        (value, !ran)
    }

    /// Number of keys with a computation currently registered.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
