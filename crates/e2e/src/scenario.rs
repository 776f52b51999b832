//! Scenario execution against a [`Browser`]

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::browser::{Browser, By};
use crate::error::{E2eError, E2eResult};
use crate::spec::{TestSpec, TestStep};
use crate::verifier::{Verifier, NEW_ITEM_INPUT};
use crate::wait::Wait;

/// Result of executing a scenario step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Runs scenario steps in one browser session
pub struct ScenarioExecutor<B: Browser> {
    verifier: Verifier<B>,
    remembered: HashMap<String, String>,
}

impl<B: Browser> ScenarioExecutor<B> {
    pub fn new(browser: B, wait: Wait, base_url: impl Into<String>) -> Self {
        Self {
            verifier: Verifier::new(browser, wait, base_url),
            remembered: HashMap::new(),
        }
    }

    pub fn verifier(&self) -> &Verifier<B> {
        &self.verifier
    }

    /// Run every step of `spec`, stopping at the first failure
    pub async fn run(&mut self, spec: &TestSpec) -> Vec<StepResult> {
        debug!("Running scenario: {}", spec.name);
        let mut results = Vec::with_capacity(spec.steps.len());
        for step in &spec.steps {
            let result = self.execute_step(step).await;
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    /// Execute a single step and time it
    pub async fn execute_step(&mut self, step: &TestStep) -> StepResult {
        let start = Instant::now();
        let step_name = step.name();
        debug!("Executing step: {}", step_name);

        let outcome = self.apply(step).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        StepResult {
            success: outcome.is_ok(),
            step_name,
            duration_ms,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// End the browser session
    pub async fn finish(self) -> E2eResult<()> {
        self.verifier.quit().await
    }

    async fn apply(&mut self, step: &TestStep) -> E2eResult<()> {
        match step {
            TestStep::Navigate { url } => self.verifier.open(url).await,
            TestStep::AssertTitleContains { text } => {
                let browser = self.verifier.browser();
                self.verifier
                    .wait()
                    .until(move || async move {
                        let title = browser.title().await?;
                        expect_contains("title", &title, text)
                    })
                    .await
            }
            TestStep::AssertText { selector, contains } => {
                let by = By::from_selector(selector)?;
                let by = &by;
                let browser = self.verifier.browser();
                self.verifier
                    .wait()
                    .until(move || async move {
                        let element = browser.find_element(by).await?;
                        let actual = browser.text(&element).await?;
                        expect_contains(&by.css(), &actual, contains)
                    })
                    .await
            }
            TestStep::AssertPlaceholder { text } => {
                let browser = self.verifier.browser();
                self.verifier
                    .wait()
                    .until(move || async move {
                        let input = browser.find_element(&By::id(NEW_ITEM_INPUT)).await?;
                        let placeholder = browser.attribute(&input, "placeholder").await?;
                        if placeholder.as_deref() == Some(text.as_str()) {
                            Ok(())
                        } else {
                            Err(E2eError::AssertionFailed(format!(
                                "placeholder is {:?}, expected {:?}",
                                placeholder, text
                            )))
                        }
                    })
                    .await
            }
            TestStep::TypeAndSubmit { text } => self.verifier.submit_item(text).await,
            TestStep::WaitForRow { text } => self.verifier.wait_for_row_in_list_table(text).await,
            TestStep::AssertBodyContains { text } => {
                let verifier = &self.verifier;
                verifier
                    .wait()
                    .until(move || async move {
                        let body = verifier.page_text().await?;
                        expect_contains("page body", &body, text)
                    })
                    .await
            }
            TestStep::AssertBodyExcludes { text } => {
                let verifier = &self.verifier;
                verifier
                    .wait()
                    .until(move || async move {
                        let body = verifier.page_text().await?;
                        if body.contains(text.as_str()) {
                            Err(E2eError::AssertionFailed(format!(
                                "page body unexpectedly contains {:?}",
                                text
                            )))
                        } else {
                            Ok(())
                        }
                    })
                    .await
            }
            TestStep::AssertUrlMatches { pattern } => {
                let re = Regex::new(pattern)?;
                let re = &re;
                let browser = self.verifier.browser();
                self.verifier
                    .wait()
                    .until(move || async move {
                        let url = browser.current_url().await?;
                        if re.is_match(&url) {
                            Ok(())
                        } else {
                            Err(E2eError::AssertionFailed(format!(
                                "URL {} does not match {}",
                                url, re
                            )))
                        }
                    })
                    .await
            }
            TestStep::RememberUrl { name } => {
                let url = self.verifier.current_url().await?;
                debug!("remembering {} = {}", name, url);
                self.remembered.insert(name.clone(), url);
                Ok(())
            }
            TestStep::AssertUrlDiffers { name } => {
                let previous = self.remembered.get(name).ok_or_else(|| {
                    E2eError::StepFailed {
                        step: step.name(),
                        reason: format!("no URL remembered as '{}'", name),
                    }
                })?;
                let browser = self.verifier.browser();
                self.verifier
                    .wait()
                    .until(move || async move {
                        let url = browser.current_url().await?;
                        if &url != previous {
                            Ok(())
                        } else {
                            Err(E2eError::AssertionFailed(format!(
                                "URL is still {}",
                                url
                            )))
                        }
                    })
                    .await
            }
            TestStep::ClearCookies => self.verifier.reset_session().await,
            TestStep::Log { message } => {
                info!("[SCENARIO] {}", message);
                Ok(())
            }
        }
    }
}

fn expect_contains(what: &str, actual: &str, expected: &str) -> E2eResult<()> {
    if actual.contains(expected) {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "{} {:?} does not contain {:?}",
            what, actual, expected
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_contains() {
        assert!(expect_contains("title", "To-Do lists", "To-Do").is_ok());
        assert!(matches!(
            expect_contains("title", "Welcome", "To-Do"),
            Err(E2eError::AssertionFailed(_))
        ));
    }
}
