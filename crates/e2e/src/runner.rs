//! Main test runner that orchestrates the server and the browser driver

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::browser::HttpBrowser;
use crate::error::{E2eError, E2eResult};
use crate::playwright::{PlaywrightConfig, PlaywrightHandle};
use crate::scenario::{ScenarioExecutor, StepResult};
use crate::server::{LiveServer, ServerConfig, ServerHandle};
use crate::spec::TestSpec;
use crate::wait::{Wait, WaitConfig};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(results: Vec<TestResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            skipped: 0,
            duration_ms,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Which browser drives the scenarios
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Driver {
    /// Built-in HTTP browser
    #[default]
    Http,
    /// Real browser through Playwright
    Playwright,
}

/// The server scenarios run against
enum RunningServer {
    InProcess(LiveServer),
    Process(ServerHandle),
}

impl RunningServer {
    fn url(&self) -> String {
        match self {
            RunningServer::InProcess(server) => server.url(),
            RunningServer::Process(handle) => handle.base_url().to_string(),
        }
    }
}

/// Main scenario runner
pub struct TestRunner {
    config: RunnerConfig,

    /// Running server (if any)
    server: Option<RunningServer>,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config, server: None }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Base URL of the running server
    pub fn base_url(&self) -> Option<String> {
        self.server.as_ref().map(RunningServer::url)
    }

    /// Start the server: the configured binary, or the app in-process
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(());
        }

        let server = match &self.config.server {
            Some(server_config) => {
                RunningServer::Process(ServerHandle::spawn(server_config.clone()).await?)
            }
            None => RunningServer::InProcess(LiveServer::start().await?),
        };

        self.config.playwright.base_url = server.url();
        self.server = Some(server);
        Ok(())
    }

    /// Stop the server
    pub async fn stop_server(&mut self) -> E2eResult<()> {
        match self.server.take() {
            Some(RunningServer::InProcess(server)) => server.stop().await,
            Some(RunningServer::Process(mut handle)) => handle.stop(),
            None => Ok(()),
        }
    }

    /// Run all scenarios in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.config.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.config.specs_dir)?;
        let filtered: Vec<TestSpec> = TestSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<TestResult> {
        let specs = TestSpec::load_all(&self.config.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Test not found: {}", name)))?;

        self.start_server().await?;
        self.run_spec(&spec).await
    }

    /// Run a list of scenarios
    pub async fn run_specs(&mut self, specs: &[TestSpec]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let mut results = Vec::new();

        self.start_server().await?;

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            let result = match self.run_spec(spec).await {
                Ok(result) => result,
                Err(e) => TestResult {
                    name: spec.name.clone(),
                    success: false,
                    duration_ms: 0,
                    steps: vec![],
                    error: Some(e.to_string()),
                },
            };
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let suite = TestSuiteResult::from_results(results, start.elapsed().as_millis() as u64);

        info!(
            "Scenario results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );

        Ok(suite)
    }

    /// Run a single scenario in a fresh browser session
    pub async fn run_spec(&mut self, spec: &TestSpec) -> E2eResult<TestResult> {
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let base_url = self
            .base_url()
            .ok_or_else(|| E2eError::ServerStartup("server not started".into()))?;

        let steps = match self.config.driver {
            Driver::Http => {
                let mut executor = ScenarioExecutor::new(
                    HttpBrowser::new()?,
                    Wait::new(self.config.wait),
                    base_url,
                );
                let steps = executor.run(spec).await;
                executor.finish().await?;
                steps
            }
            Driver::Playwright => {
                let mut pw_config = self.config.playwright.clone();
                pw_config.base_url = base_url;
                pw_config.wait = self.config.wait;
                PlaywrightHandle::new(pw_config)?.run_spec(spec).await?
            }
        };

        let error = steps
            .iter()
            .find(|s| !s.success)
            .map(|s| format!("{}: {}", s.step_name, s.error.as_deref().unwrap_or("failed")));
        let success = error.is_none() && steps.len() == spec.steps.len();
        let error = match error {
            None if !success => Some(format!(
                "only {} of {} steps ran",
                steps.len(),
                spec.steps.len()
            )),
            other => other,
        };

        Ok(TestResult {
            name: spec.name.clone(),
            success,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            error,
        })
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.config.output_dir, results)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `results` as `test-results.json` under `output_dir`
pub fn write_results(output_dir: &Path, results: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Spawn this binary; `None` serves the app in-process
    pub server: Option<ServerConfig>,
    pub playwright: PlaywrightConfig,
    pub wait: WaitConfig,
    pub driver: Driver,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: None,
            playwright: PlaywrightConfig::default(),
            wait: WaitConfig::from_env(),
            driver: Driver::Http,
            specs_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/specs")),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_counts() {
        let result = |name: &str, success| TestResult {
            name: name.into(),
            success,
            duration_ms: 1,
            steps: vec![],
            error: None,
        };
        let suite =
            TestSuiteResult::from_results(vec![result("a", true), result("b", false)], 10);
        assert_eq!((suite.total, suite.passed, suite.failed), (2, 1, 1));
        assert!(!suite.all_passed());
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let suite = TestSuiteResult::from_results(vec![], 0);
        let path = write_results(&dir.path().join("out"), &suite).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["total"], 0);
    }

    #[tokio::test]
    async fn test_run_spec_requires_server() {
        let mut runner = TestRunner::new();
        let spec = TestSpec::from_yaml("name: x\nsteps: []\n").unwrap();
        assert!(matches!(
            runner.run_spec(&spec).await,
            Err(E2eError::ServerStartup(_))
        ));
    }
}
