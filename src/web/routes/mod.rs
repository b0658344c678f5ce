pub mod channel_routes;
pub mod routing_routes;
pub mod topic_routes;
pub mod webhook_routes;
