//! PMode resolution for pull requests
//!
//! A pull request names only an MPC, so the PMode cannot be found by
//! parties or agreement reference.

use crate::pmode::{MepBinding, PMode, PModeRegistry};
use std::sync::Arc;

pub trait PullRequestPModeResolver: Send + Sync {
    fn resolve(&self, mpc: &str) -> Option<Arc<PMode>>;
}

/// Resolves the first (by id) pull-bound PMode whose leg 1 uses the MPC
pub struct RegistryPullResolver {
    registry: Arc<PModeRegistry>,
}

impl RegistryPullResolver {
    pub fn new(registry: Arc<PModeRegistry>) -> Self {
        Self { registry }
    }
}

impl PullRequestPModeResolver for RegistryPullResolver {
    fn resolve(&self, mpc: &str) -> Option<Arc<PMode>> {
        let pmodes = match self.registry.all() {
            Ok(pmodes) => pmodes,
            Err(e) => {
                tracing::warn!(error = %e, "PMode registry unavailable for pull resolution");
                return None;
            }
        };

        pmodes.into_iter().find(|pmode| {
            matches!(
                pmode.mep_binding,
                MepBinding::Pull | MepBinding::PushPull | MepBinding::PullPush
            ) && pmode
                .leg1
                .as_ref()
                .and_then(|leg| leg.business_info.mpc.as_deref())
                == Some(mpc)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmode::{BusinessInfo, Leg, Mep, Party};

    fn pmode(id: &str, binding: MepBinding, mpc: &str) -> PMode {
        let leg = Leg::default().with_business_info(BusinessInfo {
            mpc: Some(mpc.to_string()),
            ..Default::default()
        });
        PMode::one_way_push(id, Party::new(None, "a", "r"), Party::new(None, "b", "r"), leg)
            .with_mep(Mep::OneWay, binding)
    }

    #[test]
    fn test_resolves_pull_pmode_by_mpc() {
        let registry = Arc::new(PModeRegistry::new());
        registry.add(pmode("push", MepBinding::Push, "urn:mpc:1")).unwrap();
        registry.add(pmode("pull", MepBinding::Pull, "urn:mpc:1")).unwrap();

        let resolver = RegistryPullResolver::new(registry);
        assert_eq!(resolver.resolve("urn:mpc:1").unwrap().id, "pull");
        assert!(resolver.resolve("urn:mpc:2").is_none());
    }
}
