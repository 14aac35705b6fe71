pub mod http;
pub mod traits;
pub mod web;

pub use http::ReqwestClient;
pub use traits::{
    BrowserDriver, BrowserPage, DriverError, DriverResult, ElementHandle, HttpClient, HttpRequest,
    HttpResponse, Selector, WaitUntil,
};
