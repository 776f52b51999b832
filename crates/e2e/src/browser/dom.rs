//! Minimal HTML document model
//!
//! Parses server-rendered markup into a node tree and answers the queries a
//! functional test asks of a page: lookup by id or tag, attribute values and
//! rendered text. Scripts are not executed.

use crate::error::{E2eError, E2eResult};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose content is taken verbatim up to the matching close tag
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements whose content never contributes to rendered text
const HIDDEN_TEXT_ELEMENTS: &[&str] = &["script", "style", "head", "template"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A parsed page
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn parse(html: &str) -> E2eResult<Self> {
        let mut doc = Document {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
        };
        let mut stack = vec![doc.root()];
        let mut rest = html;

        while !rest.is_empty() {
            let parent = stack.last().copied().unwrap_or_else(|| doc.root());

            if let Some(after) = rest.strip_prefix("<!--") {
                let end = after
                    .find("-->")
                    .ok_or_else(|| E2eError::HtmlParse("unterminated comment".to_string()))?;
                rest = &after[end + 3..];
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                let end = rest
                    .find('>')
                    .ok_or_else(|| E2eError::HtmlParse("unterminated declaration".to_string()))?;
                rest = &rest[end + 1..];
            } else if let Some(after) = rest.strip_prefix("</") {
                let end = after
                    .find('>')
                    .ok_or_else(|| E2eError::HtmlParse("unterminated end tag".to_string()))?;
                let name = after[..end].trim().to_ascii_lowercase();
                doc.close(&mut stack, &name);
                rest = &after[end + 1..];
            } else if starts_tag(rest) {
                let tag = parse_start_tag(rest)?;
                rest = &rest[tag.consumed..];
                let name = tag.name.clone();
                let id = doc.push(
                    parent,
                    NodeKind::Element {
                        tag: tag.name,
                        attrs: tag.attrs,
                    },
                );

                if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    if tag.self_closing {
                        continue;
                    }
                    let close = format!("</{}", name);
                    let end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
                    let raw = &rest[..end];
                    if !raw.is_empty() {
                        let text = if name == "script" || name == "style" {
                            raw.to_string()
                        } else {
                            decode_entities(raw)
                        };
                        doc.push(id, NodeKind::Text(text));
                    }
                    // The close tag is consumed by the next iteration; the
                    // element was never pushed so closing it is a no-op.
                    rest = &rest[end..];
                } else if !tag.self_closing && !VOID_ELEMENTS.contains(&name.as_str()) {
                    stack.push(id);
                }
            } else {
                let end = text_end(rest);
                let text = decode_entities(&rest[..end]);
                if !text.is_empty() {
                    doc.push(parent, NodeKind::Text(text));
                }
                rest = &rest[end..];
            }
        }

        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Pop the open element stack back past the nearest `name`. Stray end
    /// tags are ignored.
    fn close(&self, stack: &mut Vec<NodeId>, name: &str) {
        let found = stack
            .iter()
            .rposition(|id| self.tag_name(*id) == Some(name))
            .filter(|pos| *pos > 0);
        if let Some(pos) = found {
            stack.truncate(pos);
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    /// First element in document order with the given id attribute
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|n| self.attribute(*n, "id") == Some(id))
    }

    /// Elements with the given tag below `scope`, in document order
    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.tag_name(*n) == Some(tag.as_str()))
            .collect()
    }

    /// Elements with the given id below `scope`, in document order
    pub fn elements_by_id(&self, scope: NodeId, id: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.attribute(*n, "id") == Some(id))
            .collect()
    }

    /// Nearest ancestor element with the given tag
    pub fn ancestor_by_tag(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if self.tag_name(id) == Some(tag) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// Strict descendants of `scope` in document order
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(node) = self.nodes.get(scope.0) else {
            return out;
        };
        let mut pending: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(id) = pending.pop() {
            out.push(id);
            pending.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Rendered text of `node`: descendant text with whitespace collapsed,
    /// as a WebDriver reports an element's text.
    pub fn text(&self, node: NodeId) -> String {
        let mut pieces = Vec::new();
        self.collect_text(node, &mut pieces);
        pieces
            .iter()
            .flat_map(|p| p.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn collect_text<'a>(&'a self, node: NodeId, out: &mut Vec<&'a str>) {
        let Some(n) = self.nodes.get(node.0) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(text) => out.push(text),
            NodeKind::Element { tag, .. } if HIDDEN_TEXT_ELEMENTS.contains(&tag.as_str()) => {}
            _ => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Text of the first `<title>`, empty when there is none
    pub fn title(&self) -> String {
        self.elements_by_tag(self.root(), "title")
            .first()
            .and_then(|t| self.nodes[t.0].children.first())
            .and_then(|c| match &self.nodes[c.0].kind {
                NodeKind::Text(text) => Some(text.split_whitespace().collect::<Vec<_>>().join(" ")),
                _ => None,
            })
            .unwrap_or_default()
    }
}

struct StartTag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    consumed: usize,
}

fn starts_tag(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.first() == Some(&b'<') && bytes.get(1).map_or(false, |b| b.is_ascii_alphabetic())
}

/// Length of the text run at the start of `s`
fn text_end(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if let Some(next) = bytes.get(i + 1) {
                if next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?') {
                    return i;
                }
            }
        }
        i += 1;
    }
    bytes.len()
}

fn parse_start_tag(s: &str) -> E2eResult<StartTag> {
    let bytes = s.as_bytes();
    let unterminated = || E2eError::HtmlParse(format!("unterminated tag: {}", &s[..s.len().min(40)]));

    let mut i = 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    let name = s[1..i].to_ascii_lowercase();
    let mut attrs = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            None => return Err(unterminated()),
            Some(b'>') => {
                return Ok(StartTag { name, attrs, self_closing: false, consumed: i + 1 });
            }
            Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                return Ok(StartTag { name, attrs, self_closing: true, consumed: i + 2 });
            }
            Some(b'/') => {
                i += 1;
                continue;
            }
            Some(_) => {}
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let attr_name = s[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let start = i + 1;
                    let len = s[start..].find(quote as char).ok_or_else(unterminated)?;
                    value = decode_entities(&s[start..start + len]);
                    i = start + len + 1;
                }
                Some(_) => {
                    let start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = decode_entities(&s[start..i]);
                }
                None => return Err(unterminated()),
            }
        }
        attrs.push((attr_name, value));
    }
}

/// Decode character references. Unknown references are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest[1..]
            .find(';')
            .filter(|end| *end > 0 && *end <= 10)
            .and_then(|end| decode_reference(&rest[1..=end]).map(|c| (c, end + 2)));

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(|c| c == 'x' || c == 'X') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>To-Do lists</title>
  <style>h1 { color: red; }</style>
</head>
<body>
  <!-- header -->
  <h1>Your To-Do list</h1>
  <form method="POST" action="/lists/1/">
    <input name="item_text" id="id_new_item" placeholder="Enter a to-do item" autofocus>
  </form>
  <table id="id_list_table">
    <tr><td>1: Buy peacock feathers</td></tr>
    <tr><td>2: Fish &amp; chips &lt;3</td></tr>
  </table>
  <script>if (a < b) { document.title = "x"; }</script>
</body>
</html>
"#;

    #[test]
    fn test_parse_page_structure() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(doc.title(), "To-Do lists");

        let input = doc.element_by_id("id_new_item").unwrap();
        assert_eq!(doc.tag_name(input), Some("input"));
        assert_eq!(doc.attribute(input, "placeholder"), Some("Enter a to-do item"));
        assert_eq!(doc.attribute(input, "autofocus"), Some(""));

        let form = doc.ancestor_by_tag(input, "form").unwrap();
        assert_eq!(doc.attribute(form, "action"), Some("/lists/1/"));
        assert_eq!(doc.attribute(form, "METHOD"), Some("POST"));
    }

    #[test]
    fn test_rows_and_text() {
        let doc = Document::parse(PAGE).unwrap();
        let table = doc.element_by_id("id_list_table").unwrap();
        let rows: Vec<String> = doc
            .elements_by_tag(table, "tr")
            .into_iter()
            .map(|r| doc.text(r))
            .collect();
        assert_eq!(rows, vec!["1: Buy peacock feathers", "2: Fish & chips <3"]);

        let body = doc.elements_by_tag(doc.root(), "body")[0];
        let text = doc.text(body);
        assert!(text.starts_with("Your To-Do list 1: Buy peacock feathers"));
        assert!(!text.contains("document.title"));
        assert!(!text.contains("header"));
    }

    #[test]
    fn test_void_and_self_closing_elements_do_not_nest() {
        let doc = Document::parse("<div><br><img src=x /><p>after</p></div>").unwrap();
        let p = doc.elements_by_tag(doc.root(), "p")[0];
        let parent = doc.parent(p).unwrap();
        assert_eq!(doc.tag_name(parent), Some("div"));
    }

    #[test]
    fn test_stray_end_tags_are_ignored() {
        let doc = Document::parse("<div></span><p>x</p></div></body>tail").unwrap();
        let p = doc.elements_by_tag(doc.root(), "p")[0];
        assert_eq!(doc.text(p), "x");
        assert_eq!(doc.text(doc.root()), "x tail");
    }

    #[test]
    fn test_unterminated_tag_is_an_error() {
        assert!(matches!(
            Document::parse("<input id=\"x"),
            Err(E2eError::HtmlParse(_))
        ));
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        let doc = Document::parse("<p>1 < 2</p>").unwrap();
        assert_eq!(doc.text(doc.root()), "1 < 2");
    }

    #[test]
    fn test_decode_entities() {
        let cases = [
            ("&amp;", "&"),
            ("&#x27;", "'"),
            ("&#39;", "'"),
            ("a &unknown; b", "a &unknown; b"),
            ("AT&T", "AT&T"),
            ("caf&eacute", "caf&eacute"),
        ];
        for (input, expected) in cases {
            assert_eq!(decode_entities(input), expected, "{input}");
        }
    }
}
