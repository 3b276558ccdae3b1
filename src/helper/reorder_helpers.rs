//! Drag-and-drop reordering of short manually-ranked lists.

use crate::models::{OrderEntry, Record};

/// An item carrying a manual rank.
pub trait Orderable {
    fn id(&self) -> i64;
    fn ordre(&self) -> i64;
    fn set_ordre(&mut self, ordre: i64);
}

impl Orderable for Record {
    fn id(&self) -> i64 {
        self.id
    }

    fn ordre(&self) -> i64 {
        self.i64_field("ordre").unwrap_or(0)
    }

    fn set_ordre(&mut self, ordre: i64) {
        self.fields.insert("ordre".to_string(), ordre.into());
    }
}

impl Orderable for OrderEntry {
    fn id(&self) -> i64 {
        self.id
    }

    fn ordre(&self) -> i64 {
        self.ordre
    }

    fn set_ordre(&mut self, ordre: i64) {
        self.ordre = ordre;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankStrategy {
    /// Ranks become 1, 2, 3, ... in visual order.
    #[default]
    Positional,
    /// The existing ranks, sorted, are handed out again in visual order so
    /// gaps between them survive the move.
    PreserveRanks,
}

/// Removes the item at `from` and inserts it at `to`.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() || to >= items.len() || from == to {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

/// Assigns ranks to `items` in their current order.
pub fn assign_ranks<T: Orderable>(items: &mut [T], strategy: RankStrategy) {
    let ranks: Vec<i64> = match strategy {
        RankStrategy::Positional => (1..=items.len() as i64).collect(),
        RankStrategy::PreserveRanks => {
            let mut ranks: Vec<i64> = items.iter().map(Orderable::ordre).collect();
            ranks.sort_unstable();
            ranks
        }
    };
    for (item, rank) in items.iter_mut().zip(ranks) {
        item.set_ordre(rank);
    }
}

pub fn order_payload<T: Orderable>(items: &[T]) -> Vec<OrderEntry> {
    items.iter().map(|item| OrderEntry { id: item.id(), ordre: item.ordre() }).collect()
}

/// Drops `dragged_id` onto the position of `target_id`. Returns the reordered
/// list and the full `{id, ordre}` payload, or `None` when nothing moves
/// (self-drop, unknown id).
pub fn plan_reorder<T: Orderable + Clone>(
    items: &[T],
    dragged_id: i64,
    target_id: i64,
    strategy: RankStrategy,
) -> Option<(Vec<T>, Vec<OrderEntry>)> {
    if dragged_id == target_id {
        return None;
    }
    let from = items.iter().position(|item| item.id() == dragged_id)?;
    let to = items.iter().position(|item| item.id() == target_id)?;

    let mut reordered = items.to_vec();
    move_item(&mut reordered, from, to);
    assign_ranks(&mut reordered, strategy);
    let payload = order_payload(&reordered);
    Some((reordered, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(i64, i64)]) -> Vec<OrderEntry> {
        pairs.iter().map(|&(id, ordre)| OrderEntry { id, ordre }).collect()
    }

    const A: i64 = 10;
    const B: i64 = 20;
    const C: i64 = 30;

    #[test]
    fn dragging_last_onto_first() {
        let items = entries(&[(A, 1), (B, 2), (C, 3)]);
        let (list, payload) = plan_reorder(&items, C, A, RankStrategy::Positional).unwrap();
        assert_eq!(list.iter().map(|e| e.id).collect::<Vec<_>>(), [C, A, B]);
        assert_eq!(payload, entries(&[(C, 1), (A, 2), (B, 3)]));
    }

    #[test]
    fn dragging_first_onto_last() {
        let items = entries(&[(A, 1), (B, 2), (C, 3)]);
        let (_, payload) = plan_reorder(&items, A, C, RankStrategy::Positional).unwrap();
        assert_eq!(payload, entries(&[(B, 1), (C, 2), (A, 3)]));
    }

    #[test]
    fn preserving_ranks_keeps_gaps() {
        let items = entries(&[(A, 10), (B, 20), (C, 40)]);
        let (_, payload) = plan_reorder(&items, C, A, RankStrategy::PreserveRanks).unwrap();
        assert_eq!(payload, entries(&[(C, 10), (A, 20), (B, 40)]));
    }

    #[test]
    fn self_drop_and_unknown_ids_do_nothing() {
        let items = entries(&[(A, 1), (B, 2)]);
        assert!(plan_reorder(&items, A, A, RankStrategy::Positional).is_none());
        assert!(plan_reorder(&items, 99, A, RankStrategy::Positional).is_none());
    }

    #[test]
    fn records_are_orderable() {
        let mut record = Record { id: 3, fields: Default::default() };
        assert_eq!(record.ordre(), 0);
        record.set_ordre(4);
        assert_eq!(record.i64_field("ordre"), Some(4));
    }
}
