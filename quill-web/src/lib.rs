//! Web discovery and acquisition clients.
//!
//! - Serper (Google search) client for discovery (`serper`)
//! - Firecrawl scrape client for main-content extraction (`firecrawl`)
//!
//! Both clients sit on the shared [`quill_http::HttpClient`] and return the
//! plain data types from `quill-common`.

pub mod firecrawl;
pub mod serper;

pub use firecrawl::{FirecrawlClient, ScrapeOptions};
pub use serper::SerperClient;
