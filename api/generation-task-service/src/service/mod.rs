pub mod callback_service;
pub mod callback_url_service;
pub mod image_provider_service;
pub mod ledger_service;
pub mod metrics_service;
pub mod polling_service;
pub mod pricing_service;
pub mod provider_service;
pub mod session_auth_service;
pub mod settlement_service;
pub mod submission_service;
pub mod validation_service;
pub mod video_provider_service;
