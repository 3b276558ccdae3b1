//! Optimistic drag-and-drop ordering of a short list.
//!
//! A drop reorders the local list at once and posts the full `{id, ordre}`
//! payload. If the save fails the previous list comes back and the
//! authoritative one is fetched again; only the latest fetch may land.

use crate::controllers::api_client::{ApiClient, ApiOutcome, ApiRequest};
use crate::controllers::Effect;
use crate::helper::listing_helpers::ListingQuery;
use crate::helper::reorder_helpers::{plan_reorder, RankStrategy};
use crate::models::{Notification, Record};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Refetch {
    pub ticket: u64,
    pub request: ApiRequest,
}

#[derive(Debug)]
pub struct ReorderController {
    slug: &'static str,
    client: ApiClient,
    strategy: RankStrategy,
    items: Vec<Record>,
    snapshot: Option<Vec<Record>>,
    refetch: Option<u64>,
    next_ticket: u64,
}

/// Rows from a list response: a bare array or a paginator's `data`.
fn records_from(data: &Value) -> Option<Vec<Record>> {
    let rows = match data {
        Value::Array(_) => data,
        Value::Object(map) => map.get("data")?,
        _ => return None,
    };
    serde_json::from_value(rows.clone()).ok()
}

impl ReorderController {
    pub fn new(slug: &'static str, client: ApiClient, items: Vec<Record>, strategy: RankStrategy) -> Self {
        ReorderController { slug, client, strategy, items, snapshot: None, refetch: None, next_ticket: 1 }
    }

    pub fn items(&self) -> &[Record] {
        &self.items
    }

    pub fn is_saving(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Drops `dragged` onto `target`. Returns the save request, or `None` for
    /// a self-drop, an unknown id or while a previous save is pending.
    /// A refetch still in flight is dropped.
    pub fn drop_on(&mut self, dragged: i64, target: i64) -> Option<ApiRequest> {
        if self.is_saving() {
            return None;
        }
        let (reordered, payload) = plan_reorder(&self.items, dragged, target, self.strategy)?;
        self.refetch = None;
        self.snapshot = Some(std::mem::replace(&mut self.items, reordered));
        Some(self.client.update_order(self.slug, &payload))
    }

    /// Answer to the save. On failure returns the refetch to send.
    pub fn save_complete(&mut self, outcome: ApiOutcome) -> (Vec<Effect>, Option<Refetch>) {
        let Some(snapshot) = self.snapshot.take() else {
            return (Vec::new(), None);
        };
        match outcome {
            ApiOutcome::Success { message, data } => {
                if let Some(items) = records_from(&data) {
                    self.items = items;
                }
                let message = message.unwrap_or_else(|| "Ordre mis à jour avec succès.".to_string());
                (vec![Effect::Notify(Notification::success(message))], None)
            }
            failure => {
                log::warn!("Reorder of {} failed, restoring previous order.", self.slug);
                self.items = snapshot;
                let effects = vec![Effect::Notify(Notification::error(failure.error_message().unwrap_or_default()))];
                (effects, Some(self.start_refetch()))
            }
        }
    }

    /// Fetches the authoritative list, superseding any earlier refetch.
    pub fn start_refetch(&mut self) -> Refetch {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.refetch = Some(ticket);
        Refetch { ticket, request: self.client.list(self.slug, &ListingQuery::default()) }
    }

    /// Returns whether the list was replaced. Stale tickets are ignored.
    pub fn refetch_complete(&mut self, ticket: u64, outcome: ApiOutcome) -> bool {
        if self.refetch != Some(ticket) {
            return false;
        }
        self.refetch = None;
        match outcome {
            ApiOutcome::Success { data, .. } => match records_from(&data) {
                Some(items) if !self.is_saving() => {
                    self.items = items;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}
