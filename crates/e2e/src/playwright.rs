//! Playwright browser automation
//!
//! A scenario is rendered into a single Node script so the whole scenario
//! runs in one browser context: cookies and the current page carry over from
//! step to step. Each step prints one JSON line with its [`StepResult`].

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::scenario::StepResult;
use crate::spec::{TestSpec, TestStep};
use crate::verifier::{LIST_TABLE, NEW_ITEM_INPUT};
use crate::wait::WaitConfig;

/// Browser engine Playwright launches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Engine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Chromium => "chromium",
            Engine::Firefox => "firefox",
            Engine::Webkit => "webkit",
        }
    }
}

impl FromStr for Engine {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Engine::Chromium),
            "firefox" => Ok(Engine::Firefox),
            "webkit" | "safari" => Ok(Engine::Webkit),
            other => Err(E2eError::Playwright(format!("unknown browser engine: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub engine: Engine,
    pub headless: bool,
    /// Poll policy embedded in generated scripts
    pub wait: WaitConfig,
    /// Upper bound on one scenario script
    pub script_timeout: Duration,
    /// `node_modules` directory holding the `playwright` package
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            engine: Engine::Chromium,
            headless: true,
            wait: WaitConfig::default(),
            script_timeout: Duration::from_secs(120),
            node_path: None,
        }
    }
}

/// Renders scenarios into Playwright scripts
pub struct PlaywrightScript<'a> {
    config: &'a PlaywrightConfig,
}

impl<'a> PlaywrightScript<'a> {
    pub fn new(config: &'a PlaywrightConfig) -> Self {
        Self { config }
    }

    /// Build the Node script for a whole scenario
    pub fn render(&self, spec: &TestSpec) -> String {
        let mut script = String::new();

        script.push_str(&format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

const MAX_WAIT = {max_wait};
const POLLING_RATE = {polling_rate};
const baseUrl = {base_url};

function assert(condition, message) {{
  if (!condition) throw new Error(message);
}}

async function waitFor(check) {{
  const start = Date.now();
  for (;;) {{
    try {{
      return await check();
    }} catch (error) {{
      if (Date.now() - start >= MAX_WAIT) throw error;
      await new Promise((resolve) => setTimeout(resolve, POLLING_RATE));
    }}
  }}
}}

async function step(name, body) {{
  const start = Date.now();
  try {{
    await body();
    console.log(JSON.stringify({{ step_name: name, success: true, duration_ms: Date.now() - start, error: null }}));
  }} catch (error) {{
    console.log(JSON.stringify({{ step_name: name, success: false, duration_ms: Date.now() - start, error: String(error.message || error) }}));
    throw error;
  }}
}}

(async () => {{
  const browser = await {engine}.launch({{ headless: {headless} }});
  const context = await browser.newContext();
  const page = await context.newPage();
  const remembered = {{}};
  let exitCode = 0;

  try {{
"#,
            max_wait = self.config.wait.max_wait.as_millis(),
            polling_rate = self.config.wait.polling_rate.as_millis(),
            base_url = js_string(&self.config.base_url),
            engine = self.config.engine.as_str(),
            headless = self.config.headless,
        ));

        for (i, step) in spec.steps.iter().enumerate() {
            let name = step.name();
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, name));
            script.push_str(&format!("    await step({}, async () => {{\n", js_string(&name)));
            script.push_str(&self.step_to_js(step));
            script.push_str("\n    });\n");
        }

        script.push_str(
            r#"
  } catch (error) {
    console.error(error.stack || String(error));
    exitCode = 1;
  } finally {
    await browser.close();
  }
  process.exit(exitCode);
})();
"#,
        );

        script
    }

    /// JavaScript body of one step
    fn step_to_js(&self, step: &TestStep) -> String {
        let input = js_string(&format!("#{}", NEW_ITEM_INPUT));
        match step {
            TestStep::Navigate { url } => {
                format!("      await page.goto(new URL({}, baseUrl).href);", js_string(url))
            }
            TestStep::AssertTitleContains { text } => format!(
                r#"      await waitFor(async () => {{
        const title = await page.title();
        assert(title.includes({text}), `title ${{JSON.stringify(title)}} does not contain ` + {text});
      }});"#,
                text = js_string(text)
            ),
            TestStep::AssertText { selector, contains } => format!(
                r#"      await waitFor(async () => {{
        const el = await page.$({selector});
        assert(el, 'No such element: ' + {selector});
        const text = await el.innerText();
        assert(text.includes({contains}), `${{JSON.stringify(text)}} does not contain ` + {contains});
      }});"#,
                selector = js_string(selector),
                contains = js_string(contains)
            ),
            TestStep::AssertPlaceholder { text } => format!(
                r#"      await waitFor(async () => {{
        const el = await page.$({input});
        assert(el, 'No such element: ' + {input});
        const placeholder = await el.getAttribute('placeholder');
        assert(placeholder === {text}, `placeholder is ${{JSON.stringify(placeholder)}}`);
      }});"#,
                input = input,
                text = js_string(text)
            ),
            TestStep::TypeAndSubmit { text } => format!(
                r#"      const input = await waitFor(async () => {{
        const el = await page.$({input});
        assert(el, 'No such element: ' + {input});
        return el;
      }});
      await input.type({text});
      await input.press('Enter');
      await waitFor(async () => {{
        const attached = await input.evaluate((el) => el.isConnected).catch(() => false);
        assert(!attached, 'page has not refreshed');
      }});"#,
                input = input,
                text = js_string(text)
            ),
            TestStep::WaitForRow { text } => format!(
                r#"      await waitFor(async () => {{
        const rows = await page.$$eval({rows}, (trs) => trs.map((tr) => tr.innerText.trim()));
        assert(rows.includes({text}), `${{JSON.stringify({text})}} not in list table rows ${{JSON.stringify(rows)}}`);
      }});"#,
                rows = js_string(&format!("#{} tr", LIST_TABLE)),
                text = js_string(text)
            ),
            TestStep::AssertBodyContains { text } => format!(
                r#"      await waitFor(async () => {{
        const body = await page.innerText('body');
        assert(body.includes({text}), 'page body does not contain ' + {text});
      }});"#,
                text = js_string(text)
            ),
            TestStep::AssertBodyExcludes { text } => format!(
                r#"      await waitFor(async () => {{
        const body = await page.innerText('body');
        assert(!body.includes({text}), 'page body unexpectedly contains ' + {text});
      }});"#,
                text = js_string(text)
            ),
            TestStep::AssertUrlMatches { pattern } => format!(
                r#"      await waitFor(async () => {{
        assert(new RegExp({pattern}).test(page.url()), `URL ${{page.url()}} does not match ` + {pattern});
      }});"#,
                pattern = js_string(pattern)
            ),
            TestStep::RememberUrl { name } => {
                format!("      remembered[{}] = page.url();", js_string(name))
            }
            TestStep::AssertUrlDiffers { name } => format!(
                r#"      await waitFor(async () => {{
        assert(page.url() !== remembered[{name}], `URL is still ${{page.url()}}`);
      }});"#,
                name = js_string(name)
            ),
            TestStep::ClearCookies => "      await context.clearCookies();".to_string(),
            TestStep::Log { message } => {
                format!("      console.error('[SCENARIO] ' + {});", js_string(message))
            }
        }
    }
}

/// Quote `s` as a JavaScript string literal
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// Runs scenario scripts with Node and Playwright
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    pub fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["--no-install", "playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Run a whole scenario in one browser context
    pub async fn run_spec(&self, spec: &TestSpec) -> E2eResult<Vec<StepResult>> {
        let script = PlaywrightScript::new(&self.config).render(spec);
        self.run_script(&spec.name, &script).await
    }

    /// Execute a script via Node, collecting step results from its stdout
    pub async fn run_script(&self, name: &str, script: &str) -> E2eResult<Vec<StepResult>> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path).kill_on_drop(true);
        let node_path = match &self.config.node_path {
            Some(path) => Some(path.clone()),
            None => std::env::current_dir()
                .ok()
                .map(|dir| dir.join("node_modules"))
                .filter(|dir| dir.is_dir()),
        };
        if let Some(path) = node_path {
            cmd.env("NODE_PATH", path);
        }

        let output = timeout(self.config.script_timeout, cmd.output())
            .await
            .map_err(|_| E2eError::Timeout(format!("Playwright scenario '{}'", name)))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let results = parse_step_results(&stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| l.starts_with("[SCENARIO]")) {
            info!("{}", line);
        }

        if !output.status.success() && results.iter().all(|r| r.success) {
            return Err(E2eError::Playwright(format!(
                "Script failed:\nstdout: {}\nstderr: {}",
                stdout, stderr
            )));
        }

        Ok(results)
    }
}

/// Parse the JSON lines a scenario script prints
fn parse_step_results(stdout: &str) -> Vec<StepResult> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match serde_json::from_str::<StepResult>(line) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Ignoring unparsable step result {:?}: {}", line, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TestSpec {
        TestSpec::from_yaml(
            r#"
name: new-visitor
steps:
  - action: navigate
    url: /
  - action: type_and_submit
    text: "Buy 'peacock' feathers"
  - action: wait_for_row
    text: "1: Buy 'peacock' feathers"
  - action: remember_url
    name: first
  - action: clear_cookies
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_script_embeds_wait_policy() {
        let config = PlaywrightConfig {
            wait: WaitConfig::new(Duration::from_secs(15), Duration::from_millis(100)),
            ..Default::default()
        };
        let script = PlaywrightScript::new(&config).render(&spec());
        assert!(script.contains("const MAX_WAIT = 15000;"));
        assert!(script.contains("const POLLING_RATE = 100;"));
        assert!(script.contains("chromium.launch({ headless: true })"));
    }

    #[test]
    fn test_script_runs_all_steps_in_one_context() {
        let config = PlaywrightConfig::default();
        let script = PlaywrightScript::new(&config).render(&spec());
        assert_eq!(script.matches("browser.newContext()").count(), 1);
        assert_eq!(script.matches("await step(").count(), 5);
        assert!(script.contains("await context.clearCookies();"));
        assert!(script.contains(r##"page.$$eval("#id_list_table tr""##));
    }

    #[test]
    fn test_script_quotes_user_text() {
        let config = PlaywrightConfig::default();
        let script = PlaywrightScript::new(&config).render(&spec());
        assert!(script.contains(r#"await input.type("Buy 'peacock' feathers");"#));
        assert!(script.contains(r#"const baseUrl = "http://127.0.0.1:8000";"#));
    }

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("a\"b\n"), r#""a\"b\n""#);
        assert_eq!(js_string("</script>"), r#""</script>""#);
    }

    #[test]
    fn test_parse_step_results() {
        let stdout = concat!(
            "{\"step_name\":\"navigate:/\",\"success\":true,\"duration_ms\":12,\"error\":null}\n",
            "launching chromium\n",
            "{\"step_name\":\"wait_for_row:1: x\",\"success\":false,\"duration_ms\":15001,\"error\":\"not in list\"}\n",
        );
        let results = parse_step_results(stdout);
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert_eq!(results[1].error.as_deref(), Some("not in list"));
    }

    #[test]
    fn test_engine_from_str() {
        assert_eq!("Firefox".parse::<Engine>().unwrap(), Engine::Firefox);
        assert_eq!("safari".parse::<Engine>().unwrap(), Engine::Webkit);
        assert!("lynx".parse::<Engine>().is_err());
    }
}
