#[cfg(feature = "browser")]
pub mod browser;
pub mod http;
pub mod store;

#[cfg(feature = "browser")]
pub use browser::{BrowserPage, BrowserRenderer};
pub use http::{HttpRenderer, StaticPage};
pub use store::{FsArtifactStore, JsonlSink};
