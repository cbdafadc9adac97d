use std::time::Duration;

use crate::{
    config::{EntityTtl, TtlTable},
    key::{EntityKind, KeyOperation, OperationClass},
};

/// Per-entity, per-class time-to-live lookup.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    table: TtlTable,
}

impl TtlPolicy {
    pub fn new(table: TtlTable) -> Self { Self { table } }

    pub fn ttl_for(&self, entity: EntityKind, class: OperationClass) -> Duration {
        let EntityTtl {
            list_minutes,
            item_minutes,
        } = match entity {
            EntityKind::Product => self.table.product,
            EntityKind::Customer => self.table.customer,
            EntityKind::Order => self.table.order,
        };
        let minutes = match class {
            OperationClass::List => list_minutes,
            OperationClass::Item => item_minutes,
        };
        Duration::from_secs(minutes.saturating_mul(60))
    }

    pub fn for_operation(
        &self, entity: EntityKind, operation: KeyOperation,
    ) -> Duration {
        self.ttl_for(entity, operation.class())
    }

    pub fn list(&self, entity: EntityKind) -> Duration {
        self.ttl_for(entity, OperationClass::List)
    }

    pub fn item(&self, entity: EntityKind) -> Duration {
        self.ttl_for(entity, OperationClass::Item)
    }
}
