//! TestScope Web Service
//!
//! HTTP surface for the TestScope analysis engines: visual regression,
//! XPath analysis, locator health, Playwright script metrics.

pub mod analysis;
pub mod llm;
pub mod server;
pub mod visual;

pub use llm::{LlmConfig, LlmNarrator};
pub use server::{serve, WebServer, WebServerConfig};
