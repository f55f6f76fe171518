// Smartmarks state managers
// Managers own client-side state: the bookmark view and the session that feeds it.

pub mod bookmark_session;
pub mod bookmark_view;
