use crate::controllers::api_client::{ApiClient, ApiOutcome, ApiRequest};
use crate::controllers::Effect;
use crate::models::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteState {
    Idle,
    ConfirmPending { id: i64 },
    Deleting { id: i64 },
}

/// Confirmation dialog in front of a DELETE. Deletion is not optimistic: the
/// row stays in the list until the server confirms.
#[derive(Debug)]
pub struct DeleteConfirm {
    slug: &'static str,
    client: ApiClient,
    state: DeleteState,
}

impl DeleteConfirm {
    pub fn new(slug: &'static str, client: ApiClient) -> Self {
        DeleteConfirm { slug, client, state: DeleteState::Idle }
    }

    pub fn state(&self) -> DeleteState {
        self.state
    }

    pub fn open(&self) -> bool {
        self.state != DeleteState::Idle
    }

    pub fn target_id(&self) -> Option<i64> {
        match self.state {
            DeleteState::Idle => None,
            DeleteState::ConfirmPending { id } | DeleteState::Deleting { id } => Some(id),
        }
    }

    pub fn request(&mut self, id: i64) {
        if self.state == DeleteState::Idle {
            self.state = DeleteState::ConfirmPending { id };
        }
    }

    pub fn cancel(&mut self) {
        if let DeleteState::ConfirmPending { .. } = self.state {
            self.state = DeleteState::Idle;
        }
    }

    /// The one DELETE for the pending id. Further calls return `None`.
    pub fn confirm(&mut self) -> Option<ApiRequest> {
        let DeleteState::ConfirmPending { id } = self.state else {
            return None;
        };
        self.state = DeleteState::Deleting { id };
        Some(self.client.delete(self.slug, id))
    }

    pub fn complete(&mut self, outcome: ApiOutcome) -> Vec<Effect> {
        if !matches!(self.state, DeleteState::Deleting { .. }) {
            return Vec::new();
        }
        self.state = DeleteState::Idle;
        match outcome {
            ApiOutcome::Success { message, .. } => vec![
                Effect::RefreshList,
                Effect::Notify(Notification::success(
                    message.unwrap_or_else(|| "Élément supprimé avec succès.".to_string()),
                )),
            ],
            failure => vec![Effect::Notify(Notification::error(failure.error_message().unwrap_or_default()))],
        }
    }
}
