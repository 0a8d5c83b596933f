use super::{
    AccessControlPolicy, AccessEffect, AccessSource, CompiledPolicy, DEFAULT_REJECT_CODE,
    DEFAULT_ZONE_SIZE, LogLevel, PolicyKey, Rate, RateLimitPolicy, is_valid_zone_size,
};
use crate::resources::{AccessControlSpec, ObjectRef, Policy, RateLimitSpec, Resource};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("spec: Required value: must specify exactly one of: `accessControl`, `rateLimit`")]
    MissingKind,

    #[error("spec: Forbidden: must specify exactly one of: `accessControl`, `rateLimit`")]
    MultipleKinds,

    #[error(
        "spec.rateLimit.rate: Invalid value: \"{0}\": must consist of a positive number followed by r/s or r/m"
    )]
    InvalidRate(String),

    #[error("spec.rateLimit.key: Required value")]
    MissingKey,

    #[error(
        "spec.rateLimit.zoneSize: Invalid value: \"{0}\": must consist of numeric characters followed by a valid size suffix. 'k|K|m|M'"
    )]
    InvalidZoneSize(String),

    #[error("spec.rateLimit.rejectCode: Invalid value: {0}: must be in range 400-599")]
    InvalidRejectCode(u16),

    #[error(
        "spec.rateLimit.logLevel: Unsupported value: \"{0}\": supported values: \"info\", \"notice\", \"warn\", \"error\""
    )]
    InvalidLogLevel(String),

    #[error("spec.rateLimit.delay: Forbidden: cannot be set together with noDelay")]
    DelayWithNoDelay,

    #[error("spec.accessControl: Required value: must specify exactly one of: `allow`, `deny`")]
    MissingAccessList,

    #[error("spec.accessControl: Forbidden: must specify exactly one of: `allow`, `deny`")]
    MultipleAccessLists,

    #[error("spec.accessControl.{effect}[{index}]: Invalid value: \"{value}\": must be a CIDR or IP")]
    InvalidSource {
        effect: AccessEffect,
        index: usize,
        value: String,
    },
}

/// Validates a Policy resource, reporting every problem at once.
pub fn compile_policy(policy: &Policy) -> Result<CompiledPolicy, Vec<PolicyError>> {
    match (policy.spec().rate_limit(), policy.spec().access_control()) {
        (Some(rate_limit), None) => {
            compile_rate_limit(rate_limit).map(|p| CompiledPolicy::RateLimit(Arc::new(p)))
        }
        (None, Some(access_control)) => compile_access_control(access_control)
            .map(|p| CompiledPolicy::AccessControl(Arc::new(p))),
        (None, None) => Err(vec![PolicyError::MissingKind]),
        (Some(_), Some(_)) => Err(vec![PolicyError::MultipleKinds]),
    }
}

fn compile_rate_limit(spec: &RateLimitSpec) -> Result<RateLimitPolicy, Vec<PolicyError>> {
    let mut errors = Vec::new();

    let rate = match spec.rate().parse::<Rate>() {
        Ok(rate) => Some(rate),
        Err(_) => {
            errors.push(PolicyError::InvalidRate(spec.rate().clone()));
            None
        }
    };

    if spec.key().trim().is_empty() {
        errors.push(PolicyError::MissingKey);
    }

    let zone_size = spec
        .zone_size()
        .clone()
        .unwrap_or_else(|| DEFAULT_ZONE_SIZE.to_string());
    if !is_valid_zone_size(&zone_size) {
        errors.push(PolicyError::InvalidZoneSize(zone_size.clone()));
    }

    let reject_code = spec.reject_code().unwrap_or(DEFAULT_REJECT_CODE);
    if !(400..=599).contains(&reject_code) {
        errors.push(PolicyError::InvalidRejectCode(reject_code));
    }

    let log_level = match spec.log_level().as_deref().map(str::parse::<LogLevel>) {
        Some(Ok(level)) => Some(level),
        Some(Err(_)) => {
            errors.push(PolicyError::InvalidLogLevel(
                spec.log_level().clone().unwrap_or_default(),
            ));
            None
        }
        None => None,
    };

    let no_delay = spec.no_delay().unwrap_or_default();
    if no_delay && spec.delay().is_some() {
        errors.push(PolicyError::DelayWithNoDelay);
    }

    match rate {
        Some(rate) if errors.is_empty() => Ok(RateLimitPolicy {
            rate,
            key: spec.key().clone(),
            zone_size,
            burst: spec.burst(),
            delay: spec.delay(),
            no_delay,
            dry_run: spec.dry_run().unwrap_or_default(),
            log_level,
            reject_code,
            scaling_enabled: spec.scale().unwrap_or_default(),
        }),
        _ => Err(errors),
    }
}

fn compile_access_control(
    spec: &AccessControlSpec,
) -> Result<AccessControlPolicy, Vec<PolicyError>> {
    let (effect, entries) = match (spec.allow().is_empty(), spec.deny().is_empty()) {
        (false, true) => (AccessEffect::Allow, spec.allow()),
        (true, false) => (AccessEffect::Deny, spec.deny()),
        (true, true) => return Err(vec![PolicyError::MissingAccessList]),
        (false, false) => return Err(vec![PolicyError::MultipleAccessLists]),
    };

    let mut errors = Vec::new();
    let mut sources = Vec::with_capacity(entries.len());
    for (index, value) in entries.iter().enumerate() {
        match value.parse::<AccessSource>() {
            Ok(source) => sources.push(source),
            Err(_) => errors.push(PolicyError::InvalidSource {
                effect,
                index,
                value: value.clone(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(AccessControlPolicy { effect, sources })
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    object_ref: ObjectRef,
    compiled: Result<CompiledPolicy, Vec<PolicyError>>,
}

impl PolicyEntry {
    pub fn object_ref(&self) -> &ObjectRef {
        &self.object_ref
    }

    pub fn compiled(&self) -> Result<&CompiledPolicy, &[PolicyError]> {
        self.compiled.as_ref().map_err(Vec::as_slice)
    }
}

/// Every Policy of a snapshot, compiled once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyStore {
    entries: BTreeMap<PolicyKey, PolicyEntry>,
}

impl PolicyStore {
    pub fn from_policies<'a, I>(policies: I) -> Self
    where
        I: IntoIterator<Item = &'a Policy>,
    {
        let mut entries = BTreeMap::new();
        for policy in policies {
            let object_ref = policy.object_ref();
            let key = PolicyKey::new(object_ref.namespace().as_str(), object_ref.name().as_str());
            let compiled = compile_policy(policy);
            match &compiled {
                Ok(compiled) => debug!("Compiled {} policy {}", compiled.kind(), key),
                Err(errors) => warn!("Policy {} is invalid: {:?}", key, errors),
            }
            if entries.contains_key(&key) {
                warn!("Ignoring duplicate Policy {}", key);
                continue;
            }
            entries.insert(key, PolicyEntry { object_ref, compiled });
        }
        Self { entries }
    }

    /// The compiled policy, or `None` when it is missing or invalid.
    pub fn get(&self, key: &PolicyKey) -> Option<&CompiledPolicy> {
        self.entries
            .get(key)
            .and_then(|entry| entry.compiled.as_ref().ok())
    }

    pub fn entry(&self, key: &PolicyKey) -> Option<&PolicyEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&PolicyKey, &PolicyEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ObjectMeta, PolicySpec};
    use assertables::{assert_err, assert_none, assert_ok, assert_some};
    use rstest::rstest;

    fn rate_limit_policy(name: &str, spec: RateLimitSpec) -> Policy {
        Policy::builder()
            .metadata(ObjectMeta::builder().name(name).namespace("default").build())
            .spec(PolicySpec::builder().rate_limit(spec).build())
            .build()
    }

    #[test]
    fn test_compile_rate_limit_defaults() {
        let policy = rate_limit_policy(
            "rate-limit-primary",
            RateLimitSpec::builder()
                .rate("1r/s")
                .key("${binary_remote_addr}")
                .build(),
        );
        let CompiledPolicy::RateLimit(compiled) = assert_ok!(compile_policy(&policy)) else {
            panic!("expected a rate limit policy");
        };
        assert_eq!(compiled.rate(), Rate::per_second(1));
        assert_eq!(compiled.zone_size(), "10M");
        assert_eq!(compiled.reject_code(), 503);
        assert!(!compiled.scaling_enabled());
        assert!(!compiled.no_delay());
    }

    #[test]
    fn test_compile_rate_limit_accumulates_errors() {
        let policy = rate_limit_policy(
            "rl-pol-invalid",
            RateLimitSpec::builder()
                .rate("ten per second")
                .key("")
                .zone_size("10G")
                .reject_code(200)
                .log_level("debug")
                .build(),
        );
        let errors = assert_err!(compile_policy(&policy));
        assert_eq!(
            errors,
            vec![
                PolicyError::InvalidRate("ten per second".to_string()),
                PolicyError::MissingKey,
                PolicyError::InvalidZoneSize("10G".to_string()),
                PolicyError::InvalidRejectCode(200),
                PolicyError::InvalidLogLevel("debug".to_string()),
            ]
        );
    }

    #[rstest]
    #[case(PolicySpec::default(), PolicyError::MissingKind)]
    #[case(
        PolicySpec::builder()
            .rate_limit(RateLimitSpec::builder().rate("1r/s").key("$remote_addr").build())
            .access_control(AccessControlSpec::builder().allow(vec!["10.0.0.0/8".to_string()]).build())
            .build(),
        PolicyError::MultipleKinds
    )]
    #[case(
        PolicySpec::builder().access_control(AccessControlSpec::default()).build(),
        PolicyError::MissingAccessList
    )]
    fn test_policy_kind_rules(#[case] spec: PolicySpec, #[case] expected: PolicyError) {
        let policy = Policy::builder()
            .metadata(ObjectMeta::builder().name("p").build())
            .spec(spec)
            .build();
        assert_eq!(assert_err!(compile_policy(&policy)), vec![expected]);
    }

    #[test]
    fn test_compile_access_control() {
        let policy = Policy::builder()
            .metadata(ObjectMeta::builder().name("allow-internal").build())
            .spec(
                PolicySpec::builder()
                    .access_control(
                        AccessControlSpec::builder()
                            .allow(vec!["10.0.0.0/8".to_string(), "not-an-ip".to_string()])
                            .build(),
                    )
                    .build(),
            )
            .build();
        let errors = assert_err!(compile_policy(&policy));
        assert_eq!(
            errors[0].to_string(),
            "spec.accessControl.allow[1]: Invalid value: \"not-an-ip\": must be a CIDR or IP"
        );
    }

    #[test]
    fn test_store_hides_invalid_policies() {
        let valid = rate_limit_policy(
            "valid",
            RateLimitSpec::builder().rate("5r/s").key("$remote_addr").build(),
        );
        let invalid = rate_limit_policy(
            "invalid",
            RateLimitSpec::builder().rate("0r/s").key("$remote_addr").build(),
        );
        let store = PolicyStore::from_policies([&valid, &invalid]);

        assert_eq!(store.len(), 2);
        assert_some!(store.get(&PolicyKey::new("default", "valid")));
        assert_none!(store.get(&PolicyKey::new("default", "invalid")));
        assert_none!(store.get(&PolicyKey::new("default", "absent")));
        let entry = assert_some!(store.entry(&PolicyKey::new("default", "invalid")));
        assert!(entry.compiled().is_err());
    }
}
