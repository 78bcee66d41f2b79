//! Telemetry hook for wishlist activity.
//!
//! Observers see every state transition of the store but cannot influence
//! it. The store itself already logs through `tracing`; observers exist for
//! error tracking and product analytics.

use dawa_core::ProductId;

/// Something the wishlist store did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistEvent {
    /// An optimistic edit was applied locally.
    Toggled { product_id: ProductId, present: bool },
    /// The backend accepted a mutation.
    Committed { product_id: ProductId },
    /// The backend rejected a mutation and local state was restored.
    RolledBack { product_id: ProductId, error: String },
    /// A wishlist fetch settled.
    Revalidated { count: usize },
    /// A wishlist fetch failed.
    RevalidateFailed { error: String },
}

impl WishlistEvent {
    /// Short stable name, suitable as a metric or breadcrumb label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Toggled { .. } => "toggled",
            Self::Committed { .. } => "committed",
            Self::RolledBack { .. } => "rolled_back",
            Self::Revalidated { .. } => "revalidated",
            Self::RevalidateFailed { .. } => "revalidate_failed",
        }
    }
}

/// Receives wishlist events. Called synchronously; keep it cheap.
pub trait WishlistObserver: Send + Sync {
    fn on_event(&self, event: &WishlistEvent);
}

/// Reports wishlist activity to Sentry.
///
/// Every event becomes a breadcrumb; rollbacks and failed fetches are also
/// captured as warnings so they show up without a later error to carry them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentryObserver;

impl WishlistObserver for SentryObserver {
    fn on_event(&self, event: &WishlistEvent) {
        let data: Vec<(&str, String)> = match event {
            WishlistEvent::Toggled {
                product_id,
                present,
            } => vec![
                ("product_id", product_id.to_string()),
                ("present", present.to_string()),
            ],
            WishlistEvent::Committed { product_id } => {
                vec![("product_id", product_id.to_string())]
            }
            WishlistEvent::RolledBack { product_id, error } => vec![
                ("product_id", product_id.to_string()),
                ("error", error.clone()),
            ],
            WishlistEvent::Revalidated { count } => vec![("count", count.to_string())],
            WishlistEvent::RevalidateFailed { error } => vec![("error", error.clone())],
        };

        add_breadcrumb("wishlist", event.name(), &data);

        match event {
            WishlistEvent::RolledBack { product_id, error } => {
                sentry::capture_message(
                    &format!("Wishlist mutation for {product_id} rolled back: {error}"),
                    sentry::Level::Warning,
                );
            }
            WishlistEvent::RevalidateFailed { error } => {
                sentry::capture_message(
                    &format!("Wishlist revalidation failed: {error}"),
                    sentry::Level::Warning,
                );
            }
            _ => {}
        }
    }
}

/// Add a breadcrumb for a store action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String(value.clone()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
