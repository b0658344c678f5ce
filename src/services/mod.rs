pub mod auth_service;
pub mod channel_service;
pub mod crypto;
pub mod message_service;
pub mod routing_service;
pub mod topic_service;
