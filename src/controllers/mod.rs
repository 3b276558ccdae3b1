//! Client-side behaviour of the admin screens as plain state machines.
//!
//! Nothing here performs I/O: controllers hand out [`api_client::ApiRequest`]
//! values for the caller to send, and are fed back the classified
//! [`api_client::ApiOutcome`]. Time is passed in explicitly as `Instant`s.

pub mod api_client;
pub mod delete_confirm;
pub mod listing_search;
pub mod notifications;
pub mod reorder;
pub mod resource_form;

use crate::models::Notification;

/// Side effect a controller asks its host to carry out after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(Notification),
    /// Reload the current listing from the server.
    RefreshList,
}
