mod check;
mod library;
mod notifications;
mod session;

pub use check::cmd_check;
pub use library::{cmd_bookmark_add, cmd_bookmark_list, cmd_bookmark_remove, cmd_history, cmd_watch};
pub use notifications::{cmd_dismiss, cmd_dismiss_all, cmd_notifications, print_notifications};
pub use session::{cmd_login, cmd_logout, cmd_whoami};
