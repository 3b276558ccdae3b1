//! Listing navigation with a debounced search box.
//!
//! Every navigation gets a ticket. Starting a new one supersedes the previous:
//! its response is ignored and the host is asked to abort it.

use crate::helper::listing_helpers::{visit_url, ListingPatch, ListingQuery};
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub ticket: Ticket,
    pub url: String,
    /// In-flight navigation the host should cancel.
    pub abort: Option<Ticket>,
}

#[derive(Debug)]
pub struct ListingSearch {
    base_url: String,
    debounce: Duration,
    /// Last query the server rendered successfully.
    current: ListingQuery,
    pending_search: Option<(String, Instant)>,
    in_flight: Option<(Ticket, ListingQuery)>,
    next_ticket: u64,
}

impl ListingSearch {
    pub fn new(base_url: impl Into<String>, current: ListingQuery) -> Self {
        ListingSearch {
            base_url: base_url.into(),
            debounce: DEFAULT_DEBOUNCE,
            current,
            pending_search: None,
            in_flight: None,
            next_ticket: 1,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn current(&self) -> &ListingQuery {
        &self.current
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight.as_ref().map(|(ticket, _)| *ticket)
    }

    /// A keystroke in the search box. Restarts the debounce timer.
    pub fn input(&mut self, text: impl Into<String>, now: Instant) {
        self.pending_search = Some((text.into(), now + self.debounce));
    }

    /// When the host should call [`ListingSearch::poll`] next.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending_search.as_ref().map(|(_, due)| *due)
    }

    /// Fires the debounced search once its timer has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Navigation> {
        let due = self.deadline()?;
        if now < due {
            return None;
        }
        let (text, _) = self.pending_search.take()?;
        if self.base_query().search.as_deref().unwrap_or("") == text.trim() {
            return None;
        }
        Some(self.navigate(&ListingPatch::default().search(text)))
    }

    /// Query the next patch applies to: the in-flight one when there is one.
    fn base_query(&self) -> &ListingQuery {
        self.in_flight.as_ref().map_or(&self.current, |(_, query)| query)
    }

    /// Immediate navigation (sort, filter, page, page size).
    pub fn navigate(&mut self, patch: &ListingPatch) -> Navigation {
        let base = self.base_query().clone();
        let target = base.merge(patch);
        let url = visit_url(&self.base_url, &base, patch);

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let abort = self.in_flight.replace((ticket, target)).map(|(old, _)| old);
        Navigation { ticket, url, abort }
    }

    /// The response for `ticket` arrived. Returns whether it is current; a
    /// superseded ticket changes nothing.
    pub fn complete(&mut self, ticket: Ticket) -> bool {
        match self.in_flight.take() {
            Some((current, query)) if current == ticket => {
                self.current = query;
                true
            }
            other => {
                self.in_flight = other;
                false
            }
        }
    }

    /// The request for `ticket` failed. The last rendered query stays.
    pub fn fail(&mut self, ticket: Ticket) -> bool {
        if self.in_flight() == Some(ticket) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortDirection;

    fn listing() -> ListingSearch {
        ListingSearch::new("/admin/actualites", ListingQuery::parse("sort=titre&direction=asc&page=3"))
    }

    #[test]
    fn keystrokes_restart_the_timer() {
        let start = Instant::now();
        let mut search = listing();
        search.input("f", start);
        search.input("fe", start + Duration::from_millis(200));
        assert!(search.poll(start + Duration::from_millis(350)).is_none());

        let nav = search.poll(start + Duration::from_millis(500)).unwrap();
        assert_eq!(nav.url, "/admin/actualites?search=fe&sort=titre&direction=asc");
        assert!(nav.abort.is_none());
        assert!(search.deadline().is_none());
    }

    #[test]
    fn unchanged_search_does_not_navigate() {
        let start = Instant::now();
        let mut search = ListingSearch::new("/x", ListingQuery::parse("search=abc"));
        search.input("abc ", start);
        assert!(search.poll(start + DEFAULT_DEBOUNCE).is_none());
    }

    #[test]
    fn newer_navigation_supersedes_older() {
        let mut search = listing();
        let first = search.navigate(&ListingPatch::default().page(4));
        let second = search.navigate(&ListingPatch::default().sort("date_publication", SortDirection::Desc));
        assert_eq!(second.abort, Some(first.ticket));

        assert!(!search.complete(first.ticket));
        assert_eq!(search.current().current_page(), 3);
        assert!(search.complete(second.ticket));
        assert_eq!(search.current().sort.as_deref(), Some("date_publication"));
        assert_eq!(search.current().current_page(), 1);
    }

    #[test]
    fn page_change_keeps_other_parameters() {
        let mut search = listing();
        let nav = search.navigate(&ListingPatch::default().page(4));
        assert_eq!(nav.url, "/admin/actualites?sort=titre&direction=asc&page=4");
    }

    #[test]
    fn failure_keeps_last_rendered_listing() {
        let mut search = listing();
        let nav = search.navigate(&ListingPatch::default().search("marché"));
        assert!(search.fail(nav.ticket));
        assert_eq!(search.current(), &ListingQuery::parse("sort=titre&direction=asc&page=3"));
        assert!(!search.fail(nav.ticket));
    }
}
