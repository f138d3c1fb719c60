use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::classifier::ClassifierError;

/// Compute resources available to a classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Upper bound on worker threads; `None` lets rayon use every core
    pub max_cores: Option<usize>,
}

impl RuntimeConfig {
    pub fn with_max_cores(max_cores: Option<usize>) -> Self {
        Self { max_cores }
    }
}

/// Builds the thread pool batch prediction runs on.
///
/// Each classifier gets its own pool so a core limit never touches the global one.
pub fn create_thread_pool(config: &RuntimeConfig) -> Result<Arc<ThreadPool>, ClassifierError> {
    let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("treeclassif-{}", i));
    if let Some(threads) = config.max_cores {
        if threads == 0 {
            return Err(ClassifierError::Config("'max_cores' must be greater than zero".into()));
        }
        builder = builder.num_threads(threads);
    }
    let pool = builder
        .build()
        .map_err(|e| ClassifierError::ThreadPool(e.to_string()))?;
    log::debug!("Created thread pool with {} threads", pool.current_num_threads());
    Ok(Arc::new(pool))
}
