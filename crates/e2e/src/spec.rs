//! Declarative YAML scenario specification

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order, in a single browser session
    pub steps: Vec<TestStep>,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to the server)
    Navigate { url: String },

    /// The page title contains `text`
    AssertTitleContains { text: String },

    /// The first element matching `selector` has text containing `contains`
    AssertText { selector: String, contains: String },

    /// The new item input shows this placeholder
    AssertPlaceholder { text: String },

    /// Type `text` into the new item input and press Enter
    TypeAndSubmit { text: String },

    /// Wait for a list table row with exactly this text
    WaitForRow { text: String },

    AssertBodyContains { text: String },

    AssertBodyExcludes { text: String },

    /// The current URL matches a regular expression
    AssertUrlMatches { pattern: String },

    /// Remember the current URL under `name`
    RememberUrl { name: String },

    /// The current URL differs from the one remembered under `name`
    AssertUrlDiffers { name: String },

    /// Drop all cookies, starting a new visitor session
    ClearCookies,

    /// Log a message (for debugging)
    Log { message: String },
}

impl TestStep {
    /// Short description used in results and logs
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url } => format!("navigate:{}", url),
            TestStep::AssertTitleContains { text } => format!("assert_title_contains:{}", text),
            TestStep::AssertText { selector, .. } => format!("assert_text:{}", selector),
            TestStep::AssertPlaceholder { .. } => "assert_placeholder".to_string(),
            TestStep::TypeAndSubmit { text } => format!("type_and_submit:{}", text),
            TestStep::WaitForRow { text } => format!("wait_for_row:{}", text),
            TestStep::AssertBodyContains { text } => format!("assert_body_contains:{}", text),
            TestStep::AssertBodyExcludes { text } => format!("assert_body_excludes:{}", text),
            TestStep::AssertUrlMatches { pattern } => format!("assert_url_matches:{}", pattern),
            TestStep::RememberUrl { name } => format!("remember_url:{}", name),
            TestStep::AssertUrlDiffers { name } => format!("assert_url_differs:{}", name),
            TestStep::ClearCookies => "clear_cookies".to_string(),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl TestSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Reject scenarios that could never pass: bad patterns and URLs
    /// compared before they are remembered
    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario has no name".into()));
        }

        let mut remembered = Vec::new();
        for step in &self.steps {
            match step {
                TestStep::AssertUrlMatches { pattern } => {
                    regex::Regex::new(pattern)?;
                }
                TestStep::AssertText { selector, .. } => {
                    crate::browser::By::from_selector(selector)?;
                }
                TestStep::RememberUrl { name } => remembered.push(name.as_str()),
                TestStep::AssertUrlDiffers { name } if !remembered.contains(&name.as_str()) => {
                    return Err(E2eError::SpecParse(format!(
                        "{}: URL '{}' compared before it is remembered",
                        self.name, name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_visitor_spec() {
        let yaml = r#"
name: new-visitor
description: A visitor starts a list and adds two items
tags:
  - smoke
steps:
  - action: navigate
    url: /
  - action: assert_title_contains
    text: To-Do
  - action: assert_text
    selector: h1
    contains: To-Do
  - action: type_and_submit
    text: Buy peacock feathers
  - action: wait_for_row
    text: "1: Buy peacock feathers"
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "new-visitor");
        assert_eq!(spec.steps.len(), 5);
        assert_eq!(
            spec.steps[3],
            TestStep::TypeAndSubmit {
                text: "Buy peacock feathers".into()
            }
        );
    }

    #[test]
    fn test_parse_unit_step() {
        let spec = TestSpec::from_yaml(
            "name: fresh\nsteps:\n  - action: clear_cookies\n  - action: navigate\n    url: /\n",
        )
        .unwrap();
        assert_eq!(spec.steps[0], TestStep::ClearCookies);
        assert!(spec.tags.is_empty());
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let yaml = "name: bad\nsteps:\n  - action: screenshot\n    name: x\n";
        assert!(matches!(TestSpec::from_yaml(yaml), Err(E2eError::Yaml(_))));
    }

    #[test]
    fn test_invalid_url_pattern_is_rejected() {
        let yaml = "name: bad\nsteps:\n  - action: assert_url_matches\n    pattern: '/lists/(.+'\n";
        assert!(matches!(TestSpec::from_yaml(yaml), Err(E2eError::Regex(_))));
    }

    #[test]
    fn test_url_compared_before_remembered() {
        let yaml = "name: bad\nsteps:\n  - action: assert_url_differs\n    name: first\n";
        assert!(matches!(TestSpec::from_yaml(yaml), Err(E2eError::SpecParse(_))));
    }

    #[test]
    fn test_filter_by_tag() {
        let specs = vec![
            TestSpec::from_yaml("name: a\ntags: [smoke]\nsteps: []\n").unwrap(),
            TestSpec::from_yaml("name: b\ntags: [isolation]\nsteps: []\n").unwrap(),
        ];
        let smoke = TestSpec::filter_by_tag(&specs, "smoke");
        assert_eq!(smoke.len(), 1);
        assert_eq!(smoke[0].name, "a");
    }

    #[test]
    fn test_load_all_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "name: zeta\nsteps: []\n").unwrap();
        std::fs::write(dir.path().join("a.yml"), "name: alpha\nsteps: []\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let specs = TestSpec::load_all(dir.path()).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
