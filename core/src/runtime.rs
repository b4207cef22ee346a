//! Process-wide CPU parallelism settings.

use crate::{Error, Result};
use rayon::ThreadPoolBuilder;
use std::env;
use std::sync::OnceLock;

/// Environment variable consulted when no thread count is given explicitly.
pub const CPU_THREADS_ENV: &str = "RUSTCV_CPU_THREADS";

static THREAD_POOL_INIT: OnceLock<std::result::Result<usize, String>> = OnceLock::new();

/// Builds rayon's global pool once; later calls return the first outcome.
///
/// The thread count comes from `num_threads`, then `RUSTCV_CPU_THREADS`,
/// then rayon's default.
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<usize> {
    THREAD_POOL_INIT
        .get_or_init(|| {
            let configured = match num_threads {
                Some(n) => Some(n),
                None => threads_from_env(env::var(CPU_THREADS_ENV).ok().as_deref())?,
            };

            let mut builder = ThreadPoolBuilder::new();
            if let Some(n) = configured {
                if n == 0 {
                    return Err("thread count must be >= 1".to_string());
                }
                builder = builder.num_threads(n);
            }
            builder.build_global().map_err(|e| e.to_string())?;
            Ok(rayon::current_num_threads())
        })
        .clone()
        .map_err(Error::InvalidConfig)
}

pub fn current_cpu_threads() -> usize {
    rayon::current_num_threads()
}

fn threads_from_env(raw: Option<&str>) -> std::result::Result<Option<usize>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let parsed: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("{CPU_THREADS_ENV} must be a positive integer, got '{raw}'"))?;
    if parsed == 0 {
        return Err(format!("{CPU_THREADS_ENV} must be >= 1"));
    }
    Ok(Some(parsed))
}
