//! Records of wishlist mutations awaiting backend confirmation.

use dawa_core::{Product, ProductId};

/// Which operation produced a pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Toggle,
    Remove,
}

/// Snapshot taken before an optimistic wishlist edit.
///
/// Keyed by request id in the store; rollback restores exactly what this
/// record captured rather than whatever the list looks like later.
#[derive(Debug, Clone)]
pub(crate) struct PendingMutation {
    pub product_id: ProductId,
    pub kind: MutationKind,
    pub was_present: bool,
    /// Entity taken out of the list and the index it occupied.
    pub removed: Option<(usize, Product)>,
    /// Entity put into the list.
    pub inserted: Option<Product>,
}

impl PendingMutation {
    /// Membership this mutation is driving towards.
    pub const fn target(&self) -> bool {
        !self.was_present
    }

    /// Undo the optimistic edit on `items`.
    pub fn restore(&self, items: &mut Vec<Product>) {
        if !self.was_present {
            items.retain(|item| item.id != self.product_id);
            return;
        }
        if items.iter().any(|item| item.id == self.product_id) {
            return;
        }
        match &self.removed {
            Some((index, entity)) => items.insert((*index).min(items.len()), entity.clone()),
            None => items.insert(
                0,
                Product {
                    id: self.product_id.clone(),
                    ..Product::default()
                },
            ),
        }
    }

    /// Make `items` agree with the confirmed outcome of this mutation.
    pub fn apply_target(&self, items: &mut Vec<Product>) {
        let present = items.iter().any(|item| item.id == self.product_id);
        match (self.target(), present) {
            (true, false) => {
                let entity = self.inserted.clone().unwrap_or_else(|| Product {
                    id: self.product_id.clone(),
                    ..Product::default()
                });
                items.insert(0, entity);
            }
            (false, true) => items.retain(|item| item.id != self.product_id),
            _ => {}
        }
    }
}
