use crate::net::Hostname;
use crate::resources::{ObjectRef, Resource, TransportServer};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Listener and host a TransportServer occupies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerClaim {
    listener: String,
    host: Option<Hostname>,
}

impl ListenerClaim {
    pub fn of(transport_server: &TransportServer) -> Self {
        Self {
            listener: transport_server.spec().listener().name().clone(),
            host: transport_server.spec().host().clone(),
        }
    }
}

impl Display for ListenerClaim {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.host {
            Some(host) => write!(f, "Listener {} with host {}", self.listener, host),
            None => write!(f, "Listener {} with empty host", self.listener),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{claim} is taken by another resource")]
pub struct ClaimConflict {
    claim: ListenerClaim,
    owner: ObjectRef,
}

impl ClaimConflict {
    pub fn owner(&self) -> &ObjectRef {
        &self.owner
    }
}

/// Which TransportServer owns each (listener, host) pair. The oldest
/// resource wins; resources without a usable creation timestamp come after
/// all timestamped ones and ties fall back to `namespace/name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerClaims {
    owners: BTreeMap<ListenerClaim, ObjectRef>,
}

impl ListenerClaims {
    pub fn resolve<'a, I>(transport_servers: I) -> Self
    where
        I: IntoIterator<Item = &'a TransportServer>,
    {
        let mut owners = BTreeMap::new();
        let ordered = transport_servers.into_iter().sorted_by_key(|ts| {
            let created = ts.metadata().created_at();
            (created.is_none(), created, ts.object_ref())
        });
        for transport_server in ordered {
            owners
                .entry(ListenerClaim::of(transport_server))
                .or_insert_with(|| transport_server.object_ref());
        }
        Self { owners }
    }

    pub fn owner(&self, claim: &ListenerClaim) -> Option<&ObjectRef> {
        self.owners.get(claim)
    }

    pub fn check(&self, transport_server: &TransportServer) -> Result<(), ClaimConflict> {
        let claim = ListenerClaim::of(transport_server);
        match self.owners.get(&claim) {
            Some(owner) if *owner != transport_server.object_ref() => Err(ClaimConflict {
                claim,
                owner: owner.clone(),
            }),
            _ => Ok(()),
        }
    }
}
