//! Process-wide compiled-pattern cache. Entries are never evicted.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use ks_core::trap::trap;

use super::{CompiledPattern, PatternError};
use crate::FastHashMap;

type Cache = FastHashMap<Box<[u8]>, Arc<CompiledPattern>>;

static CACHE: LazyLock<Mutex<Cache>> = LazyLock::new(|| Mutex::new(Cache::default()));

fn lock() -> MutexGuard<'static, Cache> {
    CACHE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The cached compilation of `pattern`, compiling it on a miss. Compilation
/// runs outside the lock; when two threads race, the first insert wins.
pub fn try_cached(pattern: &[u8]) -> Result<Arc<CompiledPattern>, PatternError> {
    if let Some(hit) = lock().get(pattern) {
        return Ok(Arc::clone(hit));
    }
    log::debug!("compiling pattern {:?}", String::from_utf8_lossy(pattern));
    let compiled = Arc::new(CompiledPattern::new(pattern)?);
    let mut cache = lock();
    let entry = cache
        .entry(Box::from(pattern))
        .or_insert_with(|| Arc::clone(&compiled));
    if !Arc::ptr_eq(entry, &compiled) {
        log::debug!("pattern compiled concurrently; keeping the first copy");
    }
    Ok(Arc::clone(entry))
}

/// As `try_cached`, trapping on a syntax error.
pub fn cached(pattern: &[u8]) -> Arc<CompiledPattern> {
    match try_cached(pattern) {
        Ok(p) => p,
        Err(e) => trap(&format!("Pattern: {e}")),
    }
}

pub fn cache_len() -> usize {
    lock().len()
}

/// Drops every cached pattern. Patterns already handed out stay valid.
#[doc(hidden)]
pub fn clear_cache() {
    lock().clear();
}
