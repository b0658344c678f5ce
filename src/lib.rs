pub mod db;
pub mod dispatch;
pub mod notifications;
pub mod server;
pub mod services;
pub mod web;
