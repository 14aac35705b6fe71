pub mod driver;

pub use driver::{UnavailableBrowser, WebDriver, WebDriverConfig};
