//! Primary-seeking connection strategy.
//!
//! Each configured member is tried in order with a direct connection. If
//! none of them answers as a writable primary, a single replica-set
//! connection addressing every member is tried last, letting the driver
//! discover the primary itself. Only when that also fails is the store
//! declared unavailable.
//!
//! The strategy is independent of the driver: [`connect_with_fallback`]
//! takes the attempt as a closure so it can be exercised without a server.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::{IngestError, IngestResult};

/// One way of reaching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Direct {
        endpoint: String,
        timeout: Duration,
    },
    ReplicaSet {
        members: Vec<String>,
        set_name: String,
        timeout: Duration,
    },
}

impl ConnectionTarget {
    /// MongoDB connection string for this target.
    pub fn uri(&self) -> String {
        match self {
            ConnectionTarget::Direct { endpoint, timeout } => format!(
                "mongodb://{}/?directConnection=true&serverSelectionTimeoutMS={}",
                endpoint,
                timeout.as_millis()
            ),
            ConnectionTarget::ReplicaSet {
                members,
                set_name,
                timeout,
            } => format!(
                "mongodb://{}/?replicaSet={}&serverSelectionTimeoutMS={}",
                members.join(","),
                set_name,
                timeout.as_millis()
            ),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, ConnectionTarget::Direct { .. })
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Direct { endpoint, .. } => write!(f, "direct {}", endpoint),
            ConnectionTarget::ReplicaSet {
                members, set_name, ..
            } => write!(f, "replica set {} ({})", set_name, members.join(",")),
        }
    }
}

/// Ordered list of targets: every direct member, then the replica set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPlan {
    pub targets: Vec<ConnectionTarget>,
}

impl ConnectionPlan {
    pub fn from_config(config: &StoreConfig) -> Self {
        let direct_timeout = Duration::from_millis(config.direct_timeout_ms);
        let mut targets: Vec<ConnectionTarget> = config
            .candidates
            .iter()
            .map(|endpoint| ConnectionTarget::Direct {
                endpoint: endpoint.clone(),
                timeout: direct_timeout,
            })
            .collect();
        targets.push(ConnectionTarget::ReplicaSet {
            members: config.candidates.clone(),
            set_name: config.replica_set.clone(),
            timeout: Duration::from_millis(config.replica_set_timeout_ms),
        });
        Self { targets }
    }
}

/// Walk the plan until one attempt succeeds.
///
/// Returns the handle together with the target that produced it, or
/// [`IngestError::StoreUnavailable`] listing every failure.
pub async fn connect_with_fallback<H, F, Fut>(
    plan: &ConnectionPlan,
    mut attempt: F,
) -> IngestResult<(H, ConnectionTarget)>
where
    F: FnMut(ConnectionTarget) -> Fut,
    Fut: Future<Output = anyhow::Result<H>>,
{
    let mut failures = Vec::with_capacity(plan.targets.len());

    for target in &plan.targets {
        info!(strategy = %target, "connecting to document store");
        match attempt(target.clone()).await {
            Ok(handle) => {
                info!(strategy = %target, "document store connected");
                return Ok((handle, target.clone()));
            }
            Err(e) => {
                warn!(strategy = %target, error = %e, "connection attempt failed");
                failures.push(format!("{}: {}", target, e));
            }
        }
    }

    Err(IngestError::StoreUnavailable(if failures.is_empty() {
        "no connection targets configured".to_string()
    } else {
        failures.join("; ")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    fn plan() -> ConnectionPlan {
        ConnectionPlan::from_config(&StoreConfig::default())
    }

    #[test]
    fn plan_orders_direct_then_replica_set() {
        let plan = plan();
        assert_eq!(plan.targets.len(), 4);
        assert_eq!(
            plan.targets[0].uri(),
            "mongodb://localhost:3001/?directConnection=true&serverSelectionTimeoutMS=5000"
        );
        assert!(plan.targets[2].is_direct());
        assert_eq!(
            plan.targets[3].uri(),
            "mongodb://localhost:3001,localhost:3002,localhost:3003/?replicaSet=rs&serverSelectionTimeoutMS=10000"
        );
    }

    #[tokio::test]
    async fn first_reachable_member_wins() {
        let tried = Mutex::new(Vec::new());
        let (handle, target) = connect_with_fallback(&plan(), |target| {
            tried.lock().unwrap().push(target.to_string());
            async move {
                match &target {
                    ConnectionTarget::Direct { endpoint, .. } if endpoint.ends_with("3002") => {
                        Ok(endpoint.clone())
                    }
                    _ => bail!("unreachable"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(handle, "localhost:3002");
        assert!(target.is_direct());
        assert_eq!(
            *tried.lock().unwrap(),
            vec!["direct localhost:3001", "direct localhost:3002"]
        );
    }

    #[tokio::test]
    async fn falls_back_to_replica_set() {
        let (_, target) = connect_with_fallback(&plan(), |target| async move {
            if target.is_direct() {
                bail!("not primary")
            }
            Ok(())
        })
        .await
        .unwrap();
        assert!(matches!(target, ConnectionTarget::ReplicaSet { .. }));
    }

    #[tokio::test]
    async fn exhausted_plan_is_unavailable() {
        let result: IngestResult<((), ConnectionTarget)> =
            connect_with_fallback(&plan(), |_| async {
                Err::<(), _>(anyhow::anyhow!("connection refused"))
            })
            .await;
        match result {
            Err(IngestError::StoreUnavailable(msg)) => {
                assert!(msg.contains("direct localhost:3001: connection refused"));
                assert!(msg.contains("replica set rs"));
            }
            other => panic!("expected StoreUnavailable, got {:?}", other.map(|_| ())),
        }
    }
}
