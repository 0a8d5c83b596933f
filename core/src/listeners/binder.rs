use super::{
    ListenerContext, ListenerDefinition, ListenerProtocol, ListenerReference, ListenerRegistry,
    StructuralError,
};
use crate::resources::{TransportServerSpec, VirtualServerSpec};
use getset::Getters;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslState {
    Enabled,
    NotEnabled,
}

impl From<bool> for SslState {
    fn from(ssl: bool) -> Self {
        if ssl { Self::Enabled } else { Self::NotEnabled }
    }
}

impl Display for SslState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enabled => f.write_str("enabled"),
            Self::NotEnabled => f.write_str("not enabled"),
        }
    }
}

/// Why a listener reference did not bind. None of these are fatal to the
/// resource; only the disputed listener loses exposure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Listeners defined, but no GlobalConfiguration is deployed")]
    NoRegistry,

    #[error("Listener {name} is not defined in GlobalConfiguration")]
    MissingListener { name: String },

    #[error("Listener {name} is not defined in GlobalConfiguration ({cause})")]
    RejectedListener {
        name: String,
        cause: StructuralError,
    },

    #[error("Listener {name} can't be use in `{context}` context as SSL is {ssl} for that listener.")]
    SslMismatch {
        name: String,
        context: ListenerContext,
        ssl: SslState,
    },

    #[error("Listener {name} can't be use in `{context}` context as its protocol is {protocol}.")]
    ProtocolMismatch {
        name: String,
        context: ListenerContext,
        protocol: ListenerProtocol,
    },

    #[error("Listener {name} can't be use in `{context}` context as TLS is not configured in spec.tls.")]
    TlsRequired {
        name: String,
        context: ListenerContext,
    },

    #[error("Listener {name} doesn't exist")]
    TransportListenerMissing { name: String },

    #[error("Listener {name} has protocol {protocol}, TransportServer requires {required}")]
    TransportProtocolMismatch {
        name: String,
        protocol: ListenerProtocol,
        required: ListenerProtocol,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct BoundReference {
    #[getset(get = "pub")]
    reference: ListenerReference,

    #[getset(get = "pub")]
    result: Result<ListenerDefinition, BindingError>,
}

/// The outcome of binding one resource's listener references, in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    references: Vec<BoundReference>,
}

impl Binding {
    /// Whether the resource asked for any custom listener at all.
    pub fn is_declared(&self) -> bool {
        !self.references.is_empty()
    }

    pub fn references(&self) -> &[BoundReference] {
        &self.references
    }

    pub fn bound(&self) -> impl Iterator<Item = (ListenerContext, &ListenerDefinition)> {
        self.references.iter().filter_map(|bound| {
            bound
                .result
                .as_ref()
                .ok()
                .map(|listener| (bound.reference.context(), listener))
        })
    }

    pub fn bound_in(&self, context: ListenerContext) -> Option<&ListenerDefinition> {
        self.bound()
            .find(|(bound_context, _)| *bound_context == context)
            .map(|(_, listener)| listener)
    }

    pub fn has_bound(&self) -> bool {
        self.bound().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &BindingError> {
        self.references
            .iter()
            .filter_map(|bound| bound.result.as_ref().err())
    }

    /// Error messages in evaluation order with repeats dropped, so that a
    /// missing GlobalConfiguration is reported once per resource.
    pub fn messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = Vec::new();
        for error in self.errors() {
            let message = error.to_string();
            if !messages.contains(&message) {
                messages.push(message);
            }
        }
        messages
    }
}

/// Resolves each reference against the registry. Pure; references are
/// evaluated in the order given.
pub fn bind(registry: &ListenerRegistry, references: &[ListenerReference]) -> Binding {
    let references = references
        .iter()
        .map(|reference| {
            let result = bind_reference(registry, reference);
            if let Err(error) = &result {
                debug!("Listener reference {} not bound: {}", reference.name(), error);
            }
            BoundReference {
                reference: reference.clone(),
                result,
            }
        })
        .collect();

    Binding { references }
}

fn bind_reference(
    registry: &ListenerRegistry,
    reference: &ListenerReference,
) -> Result<ListenerDefinition, BindingError> {
    let name = reference.name().clone();

    if let ListenerContext::Transport(required) = reference.context() {
        let listener = registry
            .get(&name)
            .ok_or_else(|| BindingError::TransportListenerMissing { name: name.clone() })?;
        if listener.protocol() != required {
            return Err(BindingError::TransportProtocolMismatch {
                name,
                protocol: listener.protocol(),
                required,
            });
        }
        return Ok(listener.clone());
    }

    if !registry.is_deployed() {
        return Err(BindingError::NoRegistry);
    }

    let Some(listener) = registry.get(&name) else {
        return Err(match registry.rejection(&name) {
            Some(cause) => BindingError::RejectedListener {
                name,
                cause: cause.clone(),
            },
            None => BindingError::MissingListener { name },
        });
    };

    if !listener.protocol().is_http() {
        return Err(BindingError::ProtocolMismatch {
            name,
            context: reference.context(),
            protocol: listener.protocol(),
        });
    }

    let wants_ssl = reference.context() == ListenerContext::HttpsBlock;
    if listener.ssl() != wants_ssl {
        return Err(BindingError::SslMismatch {
            name,
            context: reference.context(),
            ssl: listener.ssl().into(),
        });
    }

    Ok(listener.clone())
}

/// Binds a VirtualServer's listener references. An HTTPS listener is only
/// exposed when the VirtualServer carries a certificate.
pub fn bind_virtual_server(registry: &ListenerRegistry, spec: &VirtualServerSpec) -> Binding {
    let mut binding = bind(registry, &virtual_server_references(spec));
    if spec.tls().is_some() {
        return binding;
    }

    for bound in &mut binding.references {
        let context = bound.reference.context();
        if context == ListenerContext::HttpsBlock && bound.result.is_ok() {
            debug!("Listener {} withheld, no TLS configured", bound.reference.name());
            bound.result = Err(BindingError::TlsRequired {
                name: bound.reference.name().clone(),
                context,
            });
        }
    }
    binding
}

/// The `listener.http` reference first, then `listener.https`.
pub fn virtual_server_references(spec: &VirtualServerSpec) -> Vec<ListenerReference> {
    let Some(listener) = spec.listener() else {
        return Vec::new();
    };

    let mut references = Vec::new();
    if let Some(name) = listener.http() {
        references.push(ListenerReference::http(name.as_str()));
    }
    if let Some(name) = listener.https() {
        references.push(ListenerReference::https(name.as_str()));
    }
    references
}

/// `None` when the declared protocol is not a transport protocol; the
/// resource fails validation in that case.
pub fn transport_server_reference(spec: &TransportServerSpec) -> Option<ListenerReference> {
    let protocol = spec.listener().protocol().parse::<ListenerProtocol>().ok()?;
    if protocol.is_http() {
        return None;
    }
    Some(ListenerReference::new(
        ListenerContext::Transport(protocol),
        spec.listener().name().as_str(),
    ))
}
