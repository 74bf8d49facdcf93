//! Shared test utilities for serialising environment mutation.

use std::env;

use tokio::sync::{Mutex, MutexGuard};

pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets several environment variables while holding a global mutex.
    pub async fn set_vars(vars: &[(&str, &str)]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let previous = vars
            .iter()
            .map(|(key, value)| {
                let old = env::var(key).ok();
                unsafe { env::set_var(key, value) };
                ((*key).to_owned(), old)
            })
            .collect();
        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.iter().rev() {
            match value {
                Some(old) => unsafe { env::set_var(key, old) },
                None => unsafe { env::remove_var(key) },
            }
        }
    }
}
