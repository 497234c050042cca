pub mod generation_task;
pub mod user_account;
