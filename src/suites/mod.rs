pub mod api;
pub mod ui;

pub use api::api_suite;
pub use ui::{login_form, ui_suite};
