//! Page-level toast queue.

use crate::controllers::Effect;
use crate::models::Notification;
use std::time::{Duration, Instant};

pub const TOAST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    /// Generation id, unique for the lifetime of the queue.
    pub id: u64,
    pub notification: Notification,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct ToastQueue {
    toasts: Vec<Toast>,
    next_id: u64,
    timeout: Duration,
}

impl Default for ToastQueue {
    fn default() -> Self {
        ToastQueue::new(TOAST_TIMEOUT)
    }
}

impl ToastQueue {
    pub fn new(timeout: Duration) -> Self {
        ToastQueue { toasts: Vec::new(), next_id: 1, timeout }
    }

    pub fn push(&mut self, notification: Notification, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.toasts.push(Toast { id, notification, expires_at: now + self.timeout });
        id
    }

    /// Pushes the notifications among `effects`, passing the rest through.
    pub fn absorb(&mut self, effects: Vec<Effect>, now: Instant) -> Vec<Effect> {
        effects
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Notify(notification) => {
                    self.push(notification, now);
                    None
                }
                other => Some(other),
            })
            .collect()
    }

    pub fn dismiss(&mut self, id: u64) {
        self.toasts.retain(|toast| toast.id != id);
    }

    /// Evicts every toast whose timeout has passed.
    pub fn expire(&mut self, now: Instant) {
        self.toasts.retain(|toast| toast.expires_at > now);
    }

    pub fn visible(&self) -> &[Toast] {
        &self.toasts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_expire_after_timeout() {
        let start = Instant::now();
        let mut queue = ToastQueue::default();
        let first = queue.push(Notification::success("Enregistré."), start);
        let second = queue.push(Notification::error("Échec."), start + Duration::from_secs(2));
        assert!(second > first);

        queue.expire(start + Duration::from_secs(4));
        assert_eq!(queue.visible().len(), 2);
        queue.expire(start + TOAST_TIMEOUT);
        assert_eq!(queue.visible().iter().map(|t| t.id).collect::<Vec<_>>(), [second]);
        queue.expire(start + Duration::from_secs(7));
        assert!(queue.visible().is_empty());
    }

    #[test]
    fn dismiss_removes_only_that_generation() {
        let now = Instant::now();
        let mut queue = ToastQueue::default();
        let a = queue.push(Notification::success("A"), now);
        queue.push(Notification::success("A"), now);
        queue.dismiss(a);
        assert_eq!(queue.visible().len(), 1);
        assert_ne!(queue.visible()[0].id, a);
    }

    #[test]
    fn absorb_keeps_non_toast_effects() {
        let mut queue = ToastQueue::default();
        let rest = queue.absorb(vec![Effect::RefreshList, Effect::Notify(Notification::success("Ok"))], Instant::now());
        assert_eq!(rest, vec![Effect::RefreshList]);
        assert_eq!(queue.visible()[0].notification, Notification::success("Ok"));
    }
}
