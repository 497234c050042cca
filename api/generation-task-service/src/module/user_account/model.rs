use crate::module::generation_task::model::TaskType;
use serde::{Deserialize, Serialize};

/// Most recent entries kept per history list.
pub const HISTORY_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Basic,
    Pro,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }

    pub fn keeps_history(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub entry_id: String,
    pub task_id: String,
    pub prompt: String,
    pub urls: Vec<String>,
    pub credits_used: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub credits: i64,
    #[serde(default)]
    pub plan: PlanTier,
    #[serde(default)]
    pub images_generated_this_month: i64,
    #[serde(default)]
    pub image_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub video_history: Vec<HistoryEntry>,
}

/// Everything a successful settlement writes to the owning user.
#[derive(Debug, Clone)]
pub struct SettlementDebit {
    pub amount: i64,
    pub task_type: TaskType,
    pub entry: HistoryEntry,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>, credits: i64, plan: PlanTier) -> Self {
        Self {
            user_id: user_id.into(),
            credits,
            plan,
            images_generated_this_month: 0,
            image_history: Vec::new(),
            video_history: Vec::new(),
        }
    }

    pub fn history(&self, task_type: TaskType) -> &[HistoryEntry] {
        match task_type {
            TaskType::Image => &self.image_history,
            TaskType::Video => &self.video_history,
        }
    }

    /// Applies a settlement debit in memory and returns the new balance.
    pub fn apply_debit(&mut self, debit: SettlementDebit) -> i64 {
        self.credits = floored_balance(self.credits, debit.amount);
        self.images_generated_this_month += 1;
        if self.plan.keeps_history() {
            let list = match debit.task_type {
                TaskType::Image => &mut self.image_history,
                TaskType::Video => &mut self.video_history,
            };
            push_bounded(list, debit.entry, HISTORY_CAP);
        }
        self.credits
    }
}

pub fn floored_balance(credits: i64, amount: i64) -> i64 {
    credits.saturating_sub(amount).max(0)
}

pub fn push_bounded<T>(list: &mut Vec<T>, item: T, cap: usize) {
    list.push(item);
    if list.len() > cap {
        let overflow = list.len() - cap;
        list.drain(..overflow);
    }
}
