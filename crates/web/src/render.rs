//! HTML pages
//!
//! Every page shares one layout: a `To-Do` title and header, and an entry
//! form whose text input is `#id_new_item`. List pages add the
//! `#id_list_table` table with one `<tr>` per item.

use superlists_common::ListView;

/// Placeholder of the new item input
pub const INPUT_PLACEHOLDER: &str = "Enter a to-do item";

/// Form field carrying the submitted item text
pub const ITEM_FIELD: &str = "item_text";

const HOME_HEADER: &str = "Start a new To-Do list";
const LIST_HEADER: &str = "Your To-Do list";

/// The "start a new list" page
pub fn home_page(error: Option<&str>) -> String {
    layout(HOME_HEADER, "/", error, "")
}

/// The page of one list, its items in order
pub fn list_page(view: &ListView, error: Option<&str>) -> String {
    let mut table = String::from("\n    <table id=\"id_list_table\">");
    for row in view.rows() {
        table.push_str("\n      <tr><td>");
        table.push_str(&escape_html(&row.to_string()));
        table.push_str("</td></tr>");
    }
    table.push_str("\n    </table>");

    layout(LIST_HEADER, &view.list.url(), error, &table)
}

pub fn not_found_page() -> String {
    simple_page("Not found", "That list does not exist.")
}

pub fn error_page() -> String {
    simple_page("Something went wrong", "Please try again.")
}

fn layout(header: &str, action: &str, error: Option<&str>, body: &str) -> String {
    let error_block = error
        .map(|msg| {
            format!(
                "\n        <div class=\"has-error\"><span class=\"help-block\">{}</span></div>",
                escape_html(msg)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>To-Do lists</title>
  <style>
    .container {{ max-width: 640px; margin: 0 auto; text-align: center; }}
    #id_new_item {{ width: 100%; font-size: 1.25em; }}
    #id_list_table {{ margin: 1em auto; text-align: left; }}
    .has-error {{ color: #a94442; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>{header}</h1>
    <form method="POST" action="{action}">
      <input name="{field}" id="id_new_item" placeholder="{placeholder}" autofocus>{error_block}
    </form>{body}
  </div>
</body>
</html>
"#,
        header = header,
        action = escape_html(action),
        field = ITEM_FIELD,
        placeholder = INPUT_PLACEHOLDER,
        error_block = error_block,
        body = body,
    )
}

fn simple_page(header: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>To-Do lists</title>
</head>
<body>
  <h1>{}</h1>
  <p>{}</p>
  <p><a href="/">Start a new To-Do list</a></p>
</body>
</html>
"#,
        escape_html(header),
        escape_html(message)
    )
}

/// Escape text for use in HTML content and double-quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
