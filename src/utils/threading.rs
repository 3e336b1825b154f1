//! # Threading Configuration
//!
//! ## Role
//! Configure rayon thread pools. Window groups and chromosomes are
//! independent, so the engine only needs a sized pool.

use crate::error::{RecomposeError, Result};

fn worker_name(i: usize) -> String {
    format!("recomposer-worker-{}", i)
}

/// Create a configured thread pool.
pub fn build_thread_pool(n_threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(worker_name)
        .build()
        .map_err(|e| RecomposeError::config(format!("Failed to create thread pool: {}", e)))
}

/// Size the global pool. Returns false, leaving the pool as is, when it was
/// already initialized.
pub fn configure_global_pool(n_threads: usize) -> bool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(worker_name)
        .build_global()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_thread_pool() {
        let pool = build_thread_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
        let name = pool.install(|| std::thread::current().name().map(str::to_string));
        assert!(name.unwrap().starts_with("recomposer-worker-"));
    }

    #[test]
    fn test_global_pool_configures_once() {
        // The first call may already lose to a pool started by another test
        let _ = configure_global_pool(2);
        assert!(!configure_global_pool(3));
    }
}
