use super::node::WindowId;
use crate::platform::BrowserHost;

/// Recency-ordered history of focused windows, most recent last.
#[derive(Debug, Clone, Default)]
pub struct FocusHistory {
    stack: Vec<WindowId>,
    any_focused: bool,
    ignored: Option<WindowId>,
}

impl FocusHistory {
    /// `ignored` is the sidebar's own window, which never enters the history
    pub fn new(ignored: Option<WindowId>) -> Self {
        Self {
            stack: Vec::new(),
            any_focused: false,
            ignored,
        }
    }

    /// Make `window_id` the most recent entry. Returns false when ignored.
    pub fn set_focused(&mut self, window_id: WindowId) -> bool {
        if self.ignored == Some(window_id) {
            tracing::debug!("Ignoring focus of sidebar window {}", window_id);
            return false;
        }
        self.stack.retain(|&id| id != window_id);
        self.stack.push(window_id);
        self.any_focused = true;
        true
    }

    /// Focus left the browser entirely
    pub fn clear_focus(&mut self) {
        self.any_focused = false;
    }

    pub fn remove(&mut self, window_id: WindowId) -> bool {
        let before = self.stack.len();
        self.stack.retain(|&id| id != window_id);
        self.stack.len() != before
    }

    /// Window `rank` positions back from the most recent one
    pub fn get_focused(&self, rank: usize) -> Option<WindowId> {
        self.stack.iter().rev().nth(rank).copied()
    }

    pub fn is_any_focused(&self) -> bool {
        self.any_focused
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Candidates for `top_focusable_window`, most recent first, starting at `rank`
    pub fn candidates(&self, rank: usize) -> Vec<WindowId> {
        self.stack.iter().rev().skip(rank).copied().collect()
    }
}

/// Walk `candidates` in order and return the first window the host reports
/// as not minimized. One host query per candidate; a failed query skips it.
pub async fn top_focusable_window(
    host: &dyn BrowserHost,
    candidates: Vec<WindowId>,
) -> Option<WindowId> {
    for window_id in candidates {
        match host.get_window(window_id).await {
            Ok(window) if !window.minimized => return Some(window_id),
            Ok(_) => {
                tracing::debug!("Window {} is minimized, skipping", window_id);
            }
            Err(e) => {
                tracing::warn!("Failed to query window {}: {}", window_id, e);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockBrowserHost;

    #[test]
    fn test_set_focused_moves_to_end() {
        let mut history = FocusHistory::new(None);
        history.set_focused(1);
        history.set_focused(2);
        history.set_focused(1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.get_focused(0), Some(1));
        assert_eq!(history.get_focused(1), Some(2));
        assert_eq!(history.get_focused(2), None);
        assert!(history.is_any_focused());
    }

    #[test]
    fn test_sidebar_window_ignored() {
        let mut history = FocusHistory::new(Some(9));
        assert!(!history.set_focused(9));
        assert!(history.is_empty());
        assert!(!history.is_any_focused());
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut history = FocusHistory::new(None);
        history.set_focused(1);
        assert!(history.remove(1));
        assert!(!history.remove(1));
        assert_eq!(history.get_focused(0), None);
    }

    #[test]
    fn test_clear_focus_keeps_history() {
        let mut history = FocusHistory::new(None);
        history.set_focused(3);
        history.clear_focus();
        assert!(!history.is_any_focused());
        assert_eq!(history.get_focused(0), Some(3));
    }

    #[tokio::test]
    async fn test_top_focusable_skips_minimized() {
        let mut history = FocusHistory::new(None);
        for id in [1, 2, 3] {
            history.set_focused(id);
        }
        let host = MockBrowserHost::new().with_minimized(&[3, 2]);
        assert_eq!(top_focusable_window(&host, history.candidates(0)).await, Some(1));

        let host = MockBrowserHost::new().with_minimized(&[3]);
        assert_eq!(top_focusable_window(&host, history.candidates(0)).await, Some(2));
        assert_eq!(top_focusable_window(&host, history.candidates(2)).await, Some(1));
    }

    #[tokio::test]
    async fn test_top_focusable_exhausted() {
        let mut history = FocusHistory::new(None);
        history.set_focused(1);
        history.set_focused(2);
        let host = MockBrowserHost::new()
            .with_minimized(&[1])
            .with_unreachable(&[2]);
        assert_eq!(top_focusable_window(&host, history.candidates(0)).await, None);
        assert_eq!(top_focusable_window(&host, history.candidates(5)).await, None);
    }
}
