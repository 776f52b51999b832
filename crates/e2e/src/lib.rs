//! Superlists functional test framework
//!
//! Browser-driven checks of the to-do application, written from a visitor's
//! point of view:
//! - Serves the app on an ephemeral port ([`LiveServer`]) or spawns the web
//!   binary as a subprocess
//! - Drives pages through the [`Browser`] trait, implemented over HTTP with a
//!   cookie jar, or through Playwright for a real browser
//! - Waits with a bounded poll that retries transient failures and reports
//!   the last real error
//! - Runs declarative YAML scenarios
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Scenario Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_server() -> LiveServer | ServerHandle          │
//! │    ├── run_spec(spec: TestSpec) -> TestResult               │
//! │    │     ├── Driver::Http       -> ScenarioExecutor         │
//! │    │     └── Driver::Playwright -> PlaywrightHandle         │
//! │    └── write_results() -> test-results.json                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Verifier<B: Browser>                                       │
//! │    ├── visit / submit_item                                  │
//! │    ├── wait_for_page_refresh   (element goes stale)         │
//! │    └── wait_for_row_in_list_table                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Wait { max_wait: 15s, polling_rate: 100ms }                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod error;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod server;
pub mod spec;
pub mod verifier;
pub mod wait;

pub use browser::{Browser, By, Element, HttpBrowser, Keys};
pub use error::{E2eError, E2eResult};
pub use runner::{Driver, RunnerConfig, TestRunner};
pub use scenario::ScenarioExecutor;
pub use server::LiveServer;
pub use spec::{TestSpec, TestStep};
pub use verifier::Verifier;
pub use wait::{Wait, WaitConfig};
