//! Task state rules derived from history.

use crate::domain::entities::{TaskHistory, TaskStatus};

/// Domain service answering "what state was this task in" questions.
pub struct TaskStateRules;

impl TaskStateRules {
    /// Status recorded by the newest `STATE_CHANGE`, or `READY` if none.
    ///
    /// Releasing a lock returns the task to this status.
    pub fn last_status(history: &[TaskHistory]) -> TaskStatus {
        history
            .iter()
            .rev()
            .find_map(TaskHistory::new_status)
            .unwrap_or(TaskStatus::Ready)
    }

    /// The newest `STATE_CHANGE` entry together with the status the task had
    /// before it.
    pub fn last_change(history: &[TaskHistory]) -> Option<(&TaskHistory, TaskStatus)> {
        let mut changes = history.iter().rev().filter(|e| e.new_status().is_some());
        let latest = changes.next()?;
        let previous = changes
            .next()
            .and_then(TaskHistory::new_status)
            .unwrap_or(TaskStatus::Ready);
        Some((latest, previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Task;

    fn task() -> Task {
        Task { id: 1, project_id: 1, ..Task::default() }
    }

    #[test]
    fn test_last_status_defaults_to_ready() {
        assert_eq!(TaskStateRules::last_status(&[]), TaskStatus::Ready);
        let comment_only = vec![TaskHistory::comment(&task(), "looks good", 1)];
        assert_eq!(TaskStateRules::last_status(&comment_only), TaskStatus::Ready);
    }

    #[test]
    fn test_last_status_uses_newest_change() {
        let t = task();
        let history = vec![
            TaskHistory::state_change(&t, TaskStatus::Mapped, 1),
            TaskHistory::comment(&t, "ok", 2),
            TaskHistory::state_change(&t, TaskStatus::Invalidated, 2),
        ];
        assert_eq!(TaskStateRules::last_status(&history), TaskStatus::Invalidated);
    }

    #[test]
    fn test_last_change_reports_previous_status() {
        let t = task();
        let history = vec![
            TaskHistory::state_change(&t, TaskStatus::Mapped, 1),
            TaskHistory::state_change(&t, TaskStatus::Validated, 2),
        ];
        let (latest, previous) = TaskStateRules::last_change(&history).unwrap();
        assert_eq!(latest.user_id, 2);
        assert_eq!(previous, TaskStatus::Mapped);

        let (_, previous) = TaskStateRules::last_change(&history[..1]).unwrap();
        assert_eq!(previous, TaskStatus::Ready);
        assert!(TaskStateRules::last_change(&[]).is_none());
    }
}
