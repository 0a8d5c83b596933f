use super::{AccessControlPolicy, CompiledPolicy, PolicyKey, PolicyStore, Rate, RateLimitPolicy};
use crate::resources::PolicyRef;
use getset::{CopyGetters, Getters};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolicyScope {
    Spec,
    Route,
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct PolicyReference {
    #[getset(get = "pub")]
    key: PolicyKey,

    #[getset(get_copy = "pub")]
    scope: PolicyScope,
}

impl PolicyReference {
    pub fn new(key: PolicyKey, scope: PolicyScope) -> Self {
        Self { key, scope }
    }

    /// Resolves a manifest reference, defaulting the namespace to the
    /// referencing resource's.
    pub fn from_ref(policy_ref: &PolicyRef, default_namespace: &str, scope: PolicyScope) -> Self {
        let namespace = policy_ref
            .namespace()
            .as_deref()
            .unwrap_or(default_namespace);
        Self::new(PolicyKey::new(namespace, policy_ref.name().as_str()), scope)
    }
}

/// Failures that reject the route the policy is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Policy {0} is missing or invalid")]
    MissingPolicy(PolicyKey),

    #[error("Policy {0} scales its rate by the controller replica count, which is unknown")]
    ReplicasUnknown(PolicyKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ResolvedRateLimit {
    #[getset(get = "pub")]
    key: PolicyKey,

    #[getset(get_copy = "pub")]
    scope: PolicyScope,

    #[getset(get = "pub")]
    policy: Arc<RateLimitPolicy>,

    /// The configured rate after scaling across replicas.
    #[getset(get_copy = "pub")]
    effective_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ResolvedAccessControl {
    #[getset(get = "pub")]
    key: PolicyKey,

    #[getset(get_copy = "pub")]
    scope: PolicyScope,

    #[getset(get = "pub")]
    policy: Arc<AccessControlPolicy>,
}

/// The policies in force for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct Resolution {
    #[getset(get = "pub")]
    rate_limit: Option<ResolvedRateLimit>,

    #[getset(get = "pub")]
    access_control: Option<ResolvedAccessControl>,

    #[getset(get = "pub")]
    errors: Vec<ResolutionError>,

    #[getset(get = "pub")]
    warnings: Vec<String>,
}

impl Resolution {
    /// A rejected route must not serve traffic.
    pub fn is_rejected(&self) -> bool {
        !self.errors.is_empty()
    }
}

struct Candidates<'a> {
    rate_limits: Vec<(&'a PolicyReference, &'a Arc<RateLimitPolicy>)>,
    access_controls: Vec<(&'a PolicyReference, &'a Arc<AccessControlPolicy>)>,
}

fn collect<'a>(
    references: &'a [PolicyReference],
    store: &'a PolicyStore,
    errors: &mut Vec<ResolutionError>,
) -> Candidates<'a> {
    let mut candidates = Candidates {
        rate_limits: Vec::new(),
        access_controls: Vec::new(),
    };
    for reference in references {
        match store.get(reference.key()) {
            Some(CompiledPolicy::RateLimit(policy)) => {
                candidates.rate_limits.push((reference, policy));
            }
            Some(CompiledPolicy::AccessControl(policy)) => {
                candidates.access_controls.push((reference, policy));
            }
            None => {
                let error = ResolutionError::MissingPolicy(reference.key().clone());
                if !errors.contains(&error) {
                    errors.push(error);
                }
            }
        }
    }
    candidates
}

/// Resolves the policies in force for one route. Route-level references of
/// a kind replace spec-level references of that kind. Among several
/// rate limits at the winning scope the lowest normalized rate wins, ties
/// going to the lowest `namespace/name`. A reference that cannot be honored
/// rejects the route rather than leaving it unprotected.
pub fn resolve(
    spec_references: &[PolicyReference],
    route_references: &[PolicyReference],
    store: &PolicyStore,
    replicas: Option<u32>,
) -> Resolution {
    let mut resolution = Resolution::default();

    let route = collect(route_references, store, &mut resolution.errors);
    let spec = collect(spec_references, store, &mut resolution.errors);

    let rate_limits = if route.rate_limits.is_empty() {
        spec.rate_limits
    } else {
        route.rate_limits
    };
    if let Some((reference, policy)) = rate_limits.into_iter().min_by(|(a_ref, a), (b_ref, b)| {
        a.rate()
            .normalized()
            .cmp(&b.rate().normalized())
            .then_with(|| a_ref.key().cmp(b_ref.key()))
    }) {
        let effective_rate = if policy.scaling_enabled() {
            replicas.map(|replicas| policy.rate().scaled(replicas))
        } else {
            Some(policy.rate())
        };
        match effective_rate {
            Some(effective_rate) => {
                debug!(
                    "Resolved rate limit {} at {:?} scope to {}",
                    reference.key(),
                    reference.scope(),
                    effective_rate
                );
                resolution.rate_limit = Some(ResolvedRateLimit {
                    key: reference.key().clone(),
                    scope: reference.scope(),
                    policy: policy.clone(),
                    effective_rate,
                });
            }
            None => resolution
                .errors
                .push(ResolutionError::ReplicasUnknown(reference.key().clone())),
        }
    }

    let access_controls = if route.access_controls.is_empty() {
        spec.access_controls
    } else {
        route.access_controls
    };
    let mut access_controls = access_controls.into_iter();
    if let Some((reference, policy)) = access_controls.next() {
        for (ignored, _) in access_controls {
            resolution.warnings.push(format!(
                "Multiple access control policies in the same context is not valid. AccessControl policy {} will be applied, {} ignored",
                reference.key(),
                ignored.key()
            ));
        }
        resolution.access_control = Some(ResolvedAccessControl {
            key: reference.key().clone(),
            scope: reference.scope(),
            policy: policy.clone(),
        });
    }

    resolution
}
