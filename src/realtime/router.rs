//! Addressing router: resolves an [`Address`] against the registry

use super::registry::{Connection, ConnectionRegistry};
use crate::core::events::Address;
use std::sync::Arc;

pub struct AddressingRouter {
    registry: Arc<ConnectionRegistry>,
    /// Honour `Scope` on role broadcasts. Off means every connection of the
    /// role receives the event.
    scoped: bool,
}

impl AddressingRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, scoped: bool) -> Self {
        Self { registry, scoped }
    }

    pub fn is_scoped(&self) -> bool {
        self.scoped
    }

    /// Live targets for `address` at this instant. Nothing is queued for
    /// actors that connect later.
    pub fn route(&self, address: &Address) -> Vec<Connection> {
        match address {
            Address::ToActor { actor_id } => self.registry.lookup(actor_id).into_iter().collect(),
            Address::ToRole { role, scope } => {
                let connections = self.registry.lookup_by_role(*role);
                if !self.scoped || scope.is_none() {
                    return connections;
                }
                connections
                    .into_iter()
                    .filter(|c| {
                        address.includes(&c.actor_id, c.role, c.zone_id.as_deref(), true)
                    })
                    .collect()
            }
        }
    }
}
