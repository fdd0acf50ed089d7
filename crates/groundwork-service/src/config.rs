//! Service configuration: cache budgets per concern and job-pool sizing.

use std::time::Duration;

use groundwork_jobs::JobManagerConfig;
use groundwork_store::DEFAULT_ALPHA;

#[derive(Debug, Clone, Copy)]
pub struct CacheBudget {
    pub ttl: Duration,
    pub max_size: usize,
}

/// One cache budget per concern so churn in one concern cannot evict
/// another's entries.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Hybrid fusion weight (vector share).
    pub alpha: f64,
    pub search_cache: CacheBudget,
    pub answer_cache: CacheBudget,
    pub card_cache: CacheBudget,
    pub evidence_cache: CacheBudget,
    pub duration_cache: CacheBudget,
    pub jobs: JobManagerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            alpha: DEFAULT_ALPHA,
            search_cache: CacheBudget {
                ttl: Duration::from_secs(300),
                max_size: 200,
            },
            answer_cache: CacheBudget {
                ttl: Duration::from_secs(1800),
                max_size: 100,
            },
            card_cache: CacheBudget {
                ttl: Duration::from_secs(1800),
                max_size: 100,
            },
            evidence_cache: CacheBudget {
                ttl: Duration::from_secs(600),
                max_size: 50,
            },
            duration_cache: CacheBudget {
                ttl: Duration::from_secs(600),
                max_size: 50,
            },
            jobs: JobManagerConfig::default(),
        }
    }
}
