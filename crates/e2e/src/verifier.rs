//! Visitor-level helpers for functional tests
//!
//! A [`Verifier`] wraps a [`Browser`] session with the bounded poll, so tests
//! read as a visitor's story: visit a page, submit an item, wait for its row.

use tracing::debug;

use crate::browser::{Browser, By, Element, Keys};
use crate::error::{E2eError, E2eResult};
use crate::wait::Wait;

/// Id of the new item input on every page
pub const NEW_ITEM_INPUT: &str = "id_new_item";

/// Id of the table listing a list's items
pub const LIST_TABLE: &str = "id_list_table";

/// A browser session against one live server
pub struct Verifier<B: Browser> {
    browser: B,
    wait: Wait,
    base_url: String,
}

impl<B: Browser> Verifier<B> {
    pub fn new(browser: B, wait: Wait, base_url: impl Into<String>) -> Self {
        Self {
            browser,
            wait,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    pub fn wait(&self) -> &Wait {
        &self.wait
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of `path` on the live server. Absolute URLs pass through.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Open `path` without waiting for any particular content
    pub async fn open(&mut self, path: &str) -> E2eResult<()> {
        let url = self.url_for(path);
        debug!("opening {}", url);
        self.browser.get(&url).await
    }

    /// Open `path` on the live server and wait for the item input to render
    pub async fn visit(&mut self, path: &str) -> E2eResult<()> {
        let url = self.url_for(path);
        debug!("visiting {}", url);
        self.browser.get(&url).await?;
        self.input_box().await?;
        Ok(())
    }

    /// The new item input, once present
    pub async fn input_box(&self) -> E2eResult<Element> {
        let browser = &self.browser;
        self.wait
            .until(move || async move { browser.find_element(&By::id(NEW_ITEM_INPUT)).await })
            .await
    }

    /// Type `text` into the item input and press Enter, waiting for the
    /// resulting page load
    pub async fn submit_item(&mut self, text: &str) -> E2eResult<()> {
        let input = self.input_box().await?;
        self.browser.send_keys(&input, text).await?;
        self.send_keys_and_wait_for_refresh(&input, Keys::ENTER).await
    }

    pub async fn send_keys_and_wait_for_refresh(&mut self, element: &Element, keys: &str) -> E2eResult<()> {
        self.browser.send_keys(element, keys).await?;
        self.wait_for_page_refresh(element).await
    }

    /// Wait until `element` no longer belongs to the current page
    pub async fn wait_for_page_refresh(&self, element: &Element) -> E2eResult<()> {
        let browser = &self.browser;
        self.wait
            .until(move || async move {
                match browser.text(element).await {
                    Err(E2eError::StaleElement(_)) => Ok(()),
                    Err(e) => Err(e),
                    Ok(_) => Err(E2eError::AssertionFailed(format!(
                        "page still showing {}",
                        element.locator()
                    ))),
                }
            })
            .await
    }

    /// Wait until the list table has a row whose text is exactly `row_text`
    pub async fn wait_for_row_in_list_table(&self, row_text: &str) -> E2eResult<()> {
        let browser = &self.browser;
        self.wait
            .until(move || async move {
                let table = browser.find_element(&By::id(LIST_TABLE)).await?;
                let rows = browser.find_child_elements(&table, &By::tag_name("tr")).await?;
                let mut texts = Vec::with_capacity(rows.len());
                for row in &rows {
                    texts.push(browser.text(row).await?);
                }
                if texts.iter().any(|t| t == row_text) {
                    Ok(())
                } else {
                    Err(E2eError::AssertionFailed(format!(
                        "{:?} not in list table rows {:?}",
                        row_text, texts
                    )))
                }
            })
            .await
    }

    /// Rendered text of the whole page body
    pub async fn page_text(&self) -> E2eResult<String> {
        let body = self.browser.find_element(&By::tag_name("body")).await?;
        self.browser.text(&body).await
    }

    pub async fn header_text(&self) -> E2eResult<String> {
        let h1 = self.browser.find_element(&By::tag_name("h1")).await?;
        self.browser.text(&h1).await
    }

    pub async fn title(&self) -> E2eResult<String> {
        self.browser.title().await
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        self.browser.current_url().await
    }

    /// Start a new visitor session: drop every cookie
    pub async fn reset_session(&mut self) -> E2eResult<()> {
        self.browser.delete_all_cookies().await
    }

    pub async fn quit(mut self) -> E2eResult<()> {
        self.browser.quit().await
    }
}
