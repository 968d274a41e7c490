use crate::dto::HealthRes;
use mobilemed_core::Store;

/// Health service shared by the API binaries.
///
/// Reports the service as healthy only when the store answers a trivial query.
#[derive(Clone, Debug)]
pub struct HealthService {
    store: Store,
}

impl HealthService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Checks store reachability.
    ///
    /// # Returns
    /// A `HealthRes` with `ok: false` and a generic message if the store is unreachable; the
    /// underlying error is logged, not returned.
    pub async fn check_health(&self) -> HealthRes {
        match self.store.ping().await {
            Ok(()) => HealthRes {
                ok: true,
                message: "MobileMed is alive".into(),
            },
            Err(e) => {
                tracing::error!("health check failed: {:?}", e);
                HealthRes {
                    ok: false,
                    message: "store unavailable".into(),
                }
            }
        }
    }
}
