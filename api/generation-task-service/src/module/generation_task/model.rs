use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Image,
    Video,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot transition task from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

impl TaskStatus {
    /// Statuses a conditional update may start from.
    pub const IN_FLIGHT: [TaskStatus; 2] = [TaskStatus::Pending, TaskStatus::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The single transition table for task status. Terminal states have no
    /// outgoing edges, so every caller that goes through here inherits the
    /// "no writes after completed/failed" rule.
    pub fn transition(self, to: TaskStatus) -> Result<TaskStatus, TransitionError> {
        let allowed = matches!(
            (self, to),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        );
        if allowed {
            Ok(to)
        } else {
            Err(TransitionError {
                from: self.as_str(),
                to: to.as_str(),
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: String,
    pub user_id: String,
    pub prompt: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub num_images: Option<u32>,
    pub status: TaskStatus,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub credits_reserved: i64,
    #[serde(default)]
    pub credits_deducted: bool,
    pub created_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_id: String,
    pub user_id: String,
    pub prompt: String,
    pub task_type: TaskType,
    pub num_images: Option<u32>,
    pub credits_reserved: i64,
}

impl TaskRecord {
    pub fn pending(new: NewTask, now: i64) -> Self {
        Self {
            task_id: new.task_id,
            user_id: new.user_id,
            prompt: new.prompt,
            task_type: new.task_type,
            num_images: new.num_images,
            status: TaskStatus::Pending,
            images: Vec::new(),
            videos: Vec::new(),
            error: None,
            credits_reserved: new.credits_reserved,
            credits_deducted: false,
            created_at: now,
            completed_at: None,
        }
    }

    pub fn result_urls(&self) -> &[String] {
        match self.task_type {
            TaskType::Image => &self.images,
            TaskType::Video => &self.videos,
        }
    }

    pub fn mark_processing(&mut self) -> Result<(), TransitionError> {
        self.status = self.status.transition(TaskStatus::Processing)?;
        Ok(())
    }

    /// Terminal success. The deduction flag flips in the same write as the
    /// status, so a task can never be completed twice nor charged twice.
    pub fn complete(&mut self, urls: Vec<String>, now: i64) -> Result<(), TransitionError> {
        if self.credits_deducted {
            return Err(TransitionError {
                from: self.status.as_str(),
                to: TaskStatus::Completed.as_str(),
            });
        }
        self.status = self.status.transition(TaskStatus::Completed)?;
        match self.task_type {
            TaskType::Image => self.images = urls,
            TaskType::Video => self.videos = urls,
        }
        self.completed_at = Some(now);
        self.credits_deducted = true;
        Ok(())
    }

    pub fn fail(&mut self, reason: String, now: i64) -> Result<(), TransitionError> {
        self.status = self.status.transition(TaskStatus::Failed)?;
        self.error = Some(reason);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn is_timed_out(&self, now: i64, ceiling_seconds: i64) -> bool {
        !self.status.is_terminal() && now - self.created_at > ceiling_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_task(task_type: TaskType) -> TaskRecord {
        TaskRecord::pending(
            NewTask {
                task_id: "task-1".to_string(),
                user_id: "user-1".to_string(),
                prompt: "a lighthouse at dusk".to_string(),
                task_type,
                num_images: Some(1),
                credits_reserved: 4,
            },
            1_000,
        )
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for from in [TaskStatus::Completed, TaskStatus::Failed] {
            for to in [
                TaskStatus::Pending,
                TaskStatus::Processing,
                TaskStatus::Completed,
                TaskStatus::Failed,
            ] {
                assert!(from.transition(to).is_err(), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn in_flight_states_can_settle() {
        for from in TaskStatus::IN_FLIGHT {
            assert_eq!(
                from.transition(TaskStatus::Completed),
                Ok(TaskStatus::Completed)
            );
            assert_eq!(from.transition(TaskStatus::Failed), Ok(TaskStatus::Failed));
        }
        assert!(TaskStatus::Processing
            .transition(TaskStatus::Pending)
            .is_err());
    }

    #[test]
    fn complete_populates_the_field_matching_task_type() {
        let mut video = pending_task(TaskType::Video);
        video
            .complete(vec!["https://cdn.test/v.mp4".to_string()], 1_050)
            .expect("complete");
        assert!(video.images.is_empty());
        assert_eq!(video.videos, vec!["https://cdn.test/v.mp4".to_string()]);
        assert_eq!(video.completed_at, Some(1_050));
        assert!(video.credits_deducted);
    }

    #[test]
    fn completed_task_cannot_be_failed_or_completed_again() {
        let mut task = pending_task(TaskType::Image);
        task.complete(vec!["https://cdn.test/a.png".to_string()], 1_010)
            .expect("complete");
        assert!(task.fail("late failure".to_string(), 1_020).is_err());
        assert!(task
            .complete(vec!["https://cdn.test/b.png".to_string()], 1_030)
            .is_err());
        assert_eq!(task.images, vec!["https://cdn.test/a.png".to_string()]);
        assert_eq!(task.completed_at, Some(1_010));
        assert!(task.error.is_none());
    }

    #[test]
    fn failed_task_keeps_credits_untouched() {
        let mut task = pending_task(TaskType::Image);
        task.fail("generation failed".to_string(), 1_010)
            .expect("fail");
        assert!(!task.credits_deducted);
        assert!(task
            .complete(vec!["https://cdn.test/a.png".to_string()], 1_020)
            .is_err());
        assert!(!task.credits_deducted);
    }

    #[test]
    fn timeout_only_applies_to_in_flight_tasks() {
        let mut task = pending_task(TaskType::Image);
        assert!(!task.is_timed_out(1_000 + 900, 900));
        assert!(task.is_timed_out(1_000 + 901, 900));
        task.fail("x".to_string(), 1_001).expect("fail");
        assert!(!task.is_timed_out(1_000 + 5_000, 900));
    }
}
