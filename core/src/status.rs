use crate::listeners::{Binding, ClaimConflict, StructuralError};
use crate::policies::{PolicyEntry, Resolution};
use crate::resources::{FieldError, ObjectRef, join_field_errors};
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum State {
    Valid,
    Warning,
    Invalid,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum Reason {
    AddedOrUpdated,
    AddedOrUpdatedWithWarning,
    Rejected,
}

/// The status written back onto a resource; replaced on every pass.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Getters, CopyGetters, Serialize, Deserialize, JsonSchema,
)]
pub struct ResourceStatus {
    #[getset(get_copy = "pub")]
    state: State,

    #[getset(get_copy = "pub")]
    reason: Reason,

    #[getset(get = "pub")]
    message: String,
}

impl ResourceStatus {
    pub fn valid(object_ref: &ObjectRef) -> Self {
        Self {
            state: State::Valid,
            reason: Reason::AddedOrUpdated,
            message: format!("Configuration for {} was added or updated", object_ref.key()),
        }
    }

    pub fn warning<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            state: State::Warning,
            reason: Reason::AddedOrUpdatedWithWarning,
            message: join_messages(messages),
        }
    }

    pub fn rejected<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            state: State::Invalid,
            reason: Reason::Rejected,
            message: join_messages(messages),
        }
    }

    /// A resource whose document failed validation as a whole.
    pub fn invalid_resource(object_ref: &ObjectRef, errors: &[FieldError]) -> Self {
        Self::rejected([format!(
            "{} was rejected with error: {}",
            object_ref,
            join_field_errors(errors)
        )])
    }
}

/// Drops repeats, keeping the first occurrence's position.
fn join_messages<I, S>(messages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    messages
        .into_iter()
        .map(|message| message.as_ref().to_string())
        .unique()
        .join("; ")
}

/// Folds listener binding and per-route policy resolution into one status.
/// Any rejected route makes the resource Invalid; otherwise any binding
/// error or policy warning makes it a Warning.
pub fn report(object_ref: &ObjectRef, binding: &Binding, resolutions: &[Resolution]) -> ResourceStatus {
    let rejections: Vec<String> = resolutions
        .iter()
        .flat_map(|resolution| resolution.errors().iter().map(ToString::to_string))
        .collect();
    let warnings: Vec<String> = binding
        .messages()
        .into_iter()
        .chain(
            resolutions
                .iter()
                .flat_map(|resolution| resolution.warnings().iter().cloned()),
        )
        .collect();

    if !rejections.is_empty() {
        ResourceStatus::rejected(rejections.into_iter().chain(warnings))
    } else if !warnings.is_empty() {
        ResourceStatus::warning(warnings)
    } else {
        ResourceStatus::valid(object_ref)
    }
}

/// A TransportServer that lost its listener claim to an older resource.
pub fn report_claim_conflict(conflict: &ClaimConflict) -> ResourceStatus {
    ResourceStatus::rejected([conflict.to_string()])
}

/// Valid when every listener was accepted, Warning when some were, Invalid
/// when none were.
pub fn report_global_configuration(
    object_ref: &ObjectRef,
    accepted: usize,
    errors: &[StructuralError],
) -> ResourceStatus {
    if errors.is_empty() {
        return ResourceStatus::valid(object_ref);
    }

    let detail = errors.iter().join(", ");
    if accepted == 0 {
        ResourceStatus::rejected([format!(
            "GlobalConfiguration {} was rejected with error: {}",
            object_ref.key(),
            detail
        )])
    } else {
        ResourceStatus::warning([format!(
            "GlobalConfiguration {} is updated with errors: {}",
            object_ref.key(),
            detail
        )])
    }
}

/// A GlobalConfiguration that is not the one the controller honors.
pub fn report_ignored_global_configuration(selected: Option<&ObjectRef>) -> ResourceStatus {
    let message = match selected {
        Some(selected) => format!(
            "GlobalConfiguration {} is in use; only one GlobalConfiguration is supported",
            selected.key()
        ),
        None => "GlobalConfiguration is not the one configured for this controller".to_string(),
    };
    ResourceStatus::rejected([message])
}

pub fn report_policy(entry: &PolicyEntry) -> ResourceStatus {
    match entry.compiled() {
        Ok(_) => ResourceStatus::valid(entry.object_ref()),
        Err(errors) => ResourceStatus::rejected([format!(
            "Policy {} is invalid and was rejected: {}",
            entry.object_ref().key(),
            errors.iter().join(", ")
        )]),
    }
}
