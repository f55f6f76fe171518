// Smartmarks services
// Services talk to the backend (stores, auth, change feed) or hold app-wide concerns (settings, form rules).

pub mod auth_service;
pub mod bookmark_form;
pub mod change_feed;
pub mod local_store;
pub mod realtime_client;
pub mod remote_store;
pub mod rest_store;
pub mod settings_engine;
