//! HTTP browser
//!
//! Drives server-rendered pages without a real browser engine: requests go
//! through a cookie-keeping `reqwest` client, responses are parsed into a
//! [`Document`], and form submission is emulated from the markup.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, Url};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::dom::{Document, NodeId};
use super::{Browser, By, Element, Keys};
use crate::error::{E2eError, E2eResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

/// Input types that never contribute a value on submit
const SKIPPED_INPUT_TYPES: &[&str] = &["submit", "button", "reset", "image", "file"];

/// A loaded page
#[derive(Debug)]
struct Page {
    url: Url,
    status: StatusCode,
    document: Document,
    /// Values typed into inputs since the page loaded
    values: HashMap<NodeId, String>,
}

impl Page {
    fn value(&self, node: NodeId) -> Option<String> {
        if let Some(typed) = self.values.get(&node) {
            return Some(typed.clone());
        }
        match self.document.tag_name(node) {
            Some("textarea") => Some(self.document.text(node)),
            _ => self.document.attribute(node, "value").map(str::to_string),
        }
    }

    fn is_text_entry(&self, node: NodeId) -> bool {
        match self.document.tag_name(node) {
            Some("textarea") => true,
            Some("input") => {
                let ty = self.document.attribute(node, "type").unwrap_or("text");
                !SKIPPED_INPUT_TYPES.contains(&ty) && ty != "checkbox" && ty != "radio"
            }
            _ => false,
        }
    }

    /// Build the request the enclosing form of `node` would send
    fn form_submission(&self, node: NodeId) -> E2eResult<FormSubmission> {
        let doc = &self.document;
        let form = doc
            .ancestor_by_tag(node, "form")
            .ok_or_else(|| E2eError::NotInteractable("element is not inside a form".into()))?;

        let method = doc
            .attribute(form, "method")
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| m == "POST")
            .map_or(FormMethod::Get, |_| FormMethod::Post);

        let url = match doc.attribute(form, "action").map(str::trim) {
            Some(action) if !action.is_empty() => self
                .url
                .join(action)
                .map_err(|e| E2eError::InvalidUrl(format!("{}: {}", action, e)))?,
            _ => self.url.clone(),
        };

        let mut fields = Vec::new();
        let controls = doc
            .elements_by_tag(form, "input")
            .into_iter()
            .chain(doc.elements_by_tag(form, "textarea"));
        for control in controls {
            let Some(name) = doc.attribute(control, "name").filter(|n| !n.is_empty()) else {
                continue;
            };
            if doc.attribute(control, "disabled").is_some() {
                continue;
            }
            let ty = doc.attribute(control, "type").unwrap_or("text").to_ascii_lowercase();
            if SKIPPED_INPUT_TYPES.contains(&ty.as_str()) {
                continue;
            }
            if (ty == "checkbox" || ty == "radio") && doc.attribute(control, "checked").is_none() {
                continue;
            }
            let default = if ty == "checkbox" || ty == "radio" { "on" } else { "" };
            let value = self.value(control).unwrap_or_else(|| default.to_string());
            fields.push((name.to_string(), value));
        }

        Ok(FormSubmission { method, url, fields })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormMethod {
    Get,
    Post,
}

#[derive(Debug)]
struct FormSubmission {
    method: FormMethod,
    url: Url,
    fields: Vec<(String, String)>,
}

/// Browser backed by plain HTTP requests
pub struct HttpBrowser {
    client: Client,
    page: Option<Page>,
    generation: u64,
}

impl HttpBrowser {
    pub fn new() -> E2eResult<Self> {
        Ok(Self {
            client: Self::build_client()?,
            page: None,
            generation: 0,
        })
    }

    fn build_client() -> E2eResult<Client> {
        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(client)
    }

    /// HTTP status of the current page
    pub fn status(&self) -> E2eResult<StatusCode> {
        Ok(self.page()?.status)
    }

    fn page(&self) -> E2eResult<&Page> {
        self.page.as_ref().ok_or(E2eError::NoPage)
    }

    /// The current page, provided `element` was found on it
    fn page_of(&self, element: &Element) -> E2eResult<&Page> {
        let page = self.page()?;
        if element.page() != self.generation || !page.document.contains(element.node()) {
            return Err(E2eError::StaleElement(element.locator().to_string()));
        }
        Ok(page)
    }

    fn resolve(&self, url: &str) -> E2eResult<Url> {
        let resolved = match &self.page {
            Some(page) => page.url.join(url),
            None => Url::parse(url),
        };
        resolved.map_err(|e| E2eError::InvalidUrl(format!("{}: {}", url, e)))
    }

    async fn load(&mut self, request: reqwest::RequestBuilder) -> E2eResult<()> {
        let response = request.send().await?;
        let url = response.url().clone();
        let status = response.status();
        let body = response.text().await?;
        debug!("loaded {} ({})", url, status);

        let document = Document::parse(&body)?;
        self.generation += 1;
        self.page = Some(Page {
            url,
            status,
            document,
            values: HashMap::new(),
        });
        Ok(())
    }

    async fn submit(&mut self, submission: FormSubmission) -> E2eResult<()> {
        debug!(
            "submitting form {:?} {} ({} fields)",
            submission.method,
            submission.url,
            submission.fields.len()
        );
        let request = match submission.method {
            FormMethod::Post => self.client.post(submission.url).form(&submission.fields),
            FormMethod::Get => {
                let mut url = submission.url;
                url.query_pairs_mut().clear().extend_pairs(&submission.fields);
                self.client.get(url)
            }
        };
        self.load(request).await
    }

    fn find_in(&self, scope: Option<NodeId>, by: &By) -> E2eResult<Vec<Element>> {
        let page = self.page()?;
        let doc = &page.document;
        let scope = scope.unwrap_or_else(|| doc.root());
        let nodes = match by {
            By::Id(id) => doc.elements_by_id(scope, id),
            By::TagName(tag) => doc.elements_by_tag(scope, tag),
        };
        Ok(nodes
            .into_iter()
            .map(|node| Element::new(self.generation, node, by.to_string()))
            .collect())
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn get(&mut self, url: &str) -> E2eResult<()> {
        let url = self.resolve(url)?;
        let request = self.client.get(url);
        self.load(request).await
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.page()?.url.to_string())
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.page()?.document.title())
    }

    async fn find_element(&self, by: &By) -> E2eResult<Element> {
        self.find_in(None, by)?
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::NoSuchElement(by.to_string()))
    }

    async fn find_elements(&self, by: &By) -> E2eResult<Vec<Element>> {
        self.find_in(None, by)
    }

    async fn find_child_elements(&self, parent: &Element, by: &By) -> E2eResult<Vec<Element>> {
        self.page_of(parent)?;
        self.find_in(Some(parent.node()), by)
    }

    async fn text(&self, element: &Element) -> E2eResult<String> {
        let page = self.page_of(element)?;
        Ok(page.document.text(element.node()))
    }

    async fn attribute(&self, element: &Element, name: &str) -> E2eResult<Option<String>> {
        let page = self.page_of(element)?;
        if name.eq_ignore_ascii_case("value") && page.is_text_entry(element.node()) {
            return Ok(page.value(element.node()));
        }
        Ok(page.document.attribute(element.node(), name).map(str::to_string))
    }

    async fn send_keys(&mut self, element: &Element, keys: &str) -> E2eResult<()> {
        let submit_at = keys.find(|c| c == '\n' || Keys::ENTER.starts_with(c));
        let (typed, rest) = match submit_at {
            Some(pos) => {
                let key_len = keys[pos..].chars().next().map_or(0, char::len_utf8);
                (&keys[..pos], Some(&keys[pos + key_len..]))
            }
            None => (keys, None),
        };

        let node = element.node();
        let submission = {
            self.page_of(element)?;
            let page = self.page.as_mut().ok_or(E2eError::NoPage)?;
            if !page.is_text_entry(node) {
                return Err(E2eError::NotInteractable(element.locator().to_string()));
            }
            let mut value = page.value(node).unwrap_or_default();
            value.push_str(typed);
            page.values.insert(node, value);

            match rest {
                Some(_) => Some(page.form_submission(node)?),
                None => None,
            }
        };

        if let Some(submission) = submission {
            self.submit(submission).await?;
            if rest.is_some_and(|r| !r.is_empty()) {
                return Err(E2eError::StaleElement(element.locator().to_string()));
            }
        }
        Ok(())
    }

    async fn delete_all_cookies(&mut self) -> E2eResult<()> {
        self.client = Self::build_client()?;
        Ok(())
    }

    async fn quit(&mut self) -> E2eResult<()> {
        self.page = None;
        self.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, html: &str) -> Page {
        Page {
            url: Url::parse(url).unwrap(),
            status: StatusCode::OK,
            document: Document::parse(html).unwrap(),
            values: HashMap::new(),
        }
    }

    const LIST_FORM: &str = r#"
        <form method="POST" action="/lists/3/">
          <input name="item_text" id="id_new_item" placeholder="Enter a to-do item">
          <input type="hidden" name="csrf" value="token">
          <input type="submit" name="go" value="Go">
          <input type="checkbox" name="urgent">
          <input name="blocked" value="x" disabled>
        </form>"#;

    #[test]
    fn test_post_form_submission() {
        let mut page = page("http://127.0.0.1:9000/lists/3/", LIST_FORM);
        let input = page.document.element_by_id("id_new_item").unwrap();
        page.values.insert(input, "Buy milk".into());

        let sub = page.form_submission(input).unwrap();
        assert_eq!(sub.method, FormMethod::Post);
        assert_eq!(sub.url.as_str(), "http://127.0.0.1:9000/lists/3/");
        assert_eq!(
            sub.fields,
            vec![
                ("item_text".to_string(), "Buy milk".to_string()),
                ("csrf".to_string(), "token".to_string()),
            ]
        );
    }

    #[test]
    fn test_form_defaults_to_get_on_current_url() {
        let page = page(
            "http://127.0.0.1:9000/search?q=old",
            r#"<form><input id="q" name="q" value="peacock"></form>"#,
        );
        let input = page.document.element_by_id("q").unwrap();
        let sub = page.form_submission(input).unwrap();
        assert_eq!(sub.method, FormMethod::Get);
        assert_eq!(sub.url.path(), "/search");
        assert_eq!(sub.fields, vec![("q".to_string(), "peacock".to_string())]);
    }

    #[test]
    fn test_input_outside_form_is_not_submittable() {
        let page = page("http://127.0.0.1:9000/", r#"<input id="lonely" name="x">"#);
        let input = page.document.element_by_id("lonely").unwrap();
        assert!(matches!(
            page.form_submission(input),
            Err(E2eError::NotInteractable(_))
        ));
    }

    #[test]
    fn test_text_entry_detection() {
        let page = page(
            "http://127.0.0.1:9000/",
            r#"<input id="a"><input id="b" type="submit"><textarea id="c">hi</textarea><h1 id="d">x</h1>"#,
        );
        let id = |s: &str| page.document.element_by_id(s).unwrap();
        assert!(page.is_text_entry(id("a")));
        assert!(!page.is_text_entry(id("b")));
        assert!(page.is_text_entry(id("c")));
        assert!(!page.is_text_entry(id("d")));
        assert_eq!(page.value(id("c")).as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_no_page_before_navigation() {
        let browser = HttpBrowser::new().unwrap();
        assert!(matches!(browser.current_url().await, Err(E2eError::NoPage)));
        assert!(matches!(
            browser.find_element(&By::id("id_new_item")).await,
            Err(E2eError::NoPage)
        ));
    }

    #[tokio::test]
    async fn test_relative_url_without_page_is_invalid() {
        let mut browser = HttpBrowser::new().unwrap();
        assert!(matches!(browser.get("/lists/1/").await, Err(E2eError::InvalidUrl(_))));
    }
}
