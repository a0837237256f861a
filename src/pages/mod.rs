mod banner;
mod dashboard;
mod import;
mod login;
mod modals;
mod note_card;
mod sidebar;

pub use dashboard::{Dashboard, RootAuthed};
pub use login::LoginPage;
