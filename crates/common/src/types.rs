//! Core types for Superlists

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Message shown when an item is submitted without any text.
pub const EMPTY_ITEM_ERROR: &str = "You can't have an empty list item";

/// Longest item text accepted, in characters.
pub const MAX_ITEM_LEN: usize = 1000;

/// Identity of a to-do list.
///
/// Backed by an SQLite `AUTOINCREMENT` key, so an id is never handed out twice
/// even if rows were ever removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(i64);

impl ListId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Canonical URL of the list, `/lists/<id>/`
    pub fn url(self) -> String {
        format!("/lists/{}/", self.0)
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListId {
    type Err = Error;

    /// Parse a URL path segment. Anything that is not a positive integer can
    /// never name a list, so it is reported as not found rather than invalid.
    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<i64>() {
            Ok(raw) if raw > 0 && !s.starts_with('+') => Ok(Self(raw)),
            _ => Err(Error::list_not_found(s)),
        }
    }
}

/// A to-do list. Lists carry no mutable state of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub id: ListId,
    pub created_at: i64,
}

impl List {
    pub fn url(&self) -> String {
        self.id.url()
    }
}

/// Validated item text: not empty, not only whitespace, not too long.
///
/// The text is kept exactly as submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemText(String);

impl ItemText {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::Validation(EMPTY_ITEM_ERROR.to_string()));
        }
        let len = raw.chars().count();
        if len > MAX_ITEM_LEN {
            return Err(Error::Validation(format!(
                "List items are limited to {} characters (got {})",
                MAX_ITEM_LEN, len
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for ItemText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One entry of a list. `position` is derived from insertion order when the
/// item is read back; it is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub list_id: ListId,
    pub position: usize,
    pub text: String,
    pub created_at: i64,
}

impl Item {
    /// Display form used in the list table, `"<position>: <text>"`
    pub fn row_text(&self) -> String {
        format!("{}: {}", self.position, self.text)
    }
}

/// A list together with its items in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListView {
    pub list: List,
    pub items: Vec<Item>,
}

impl ListView {
    /// Display rows in order. Each call starts a fresh pass over the items.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.items.iter().map(|item| Row {
            position: item.position,
            text: &item.text,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// A rendered table row, `"<position>: <text>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row<'a> {
    pub position: usize,
    pub text: &'a str,
}

impl fmt::Display for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_id_parse() {
        assert_eq!("1".parse::<ListId>().unwrap(), ListId::new(1));
        assert_eq!("42".parse::<ListId>().unwrap().url(), "/lists/42/");

        for bad in ["", "0", "-3", "+4", "abc", "1.5", "list_a"] {
            let err = bad.parse::<ListId>().unwrap_err();
            assert!(err.is_not_found(), "{bad:?} should be not found, got {err}");
        }
    }

    #[test]
    fn test_item_text_validation() {
        assert_eq!(ItemText::parse("Buy milk").unwrap().as_str(), "Buy milk");
        assert_eq!(ItemText::parse("  padded  ").unwrap().as_str(), "  padded  ");

        let err = ItemText::parse("").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), EMPTY_ITEM_ERROR);
        assert!(ItemText::parse(" \t\n ").unwrap_err().is_validation());

        assert!(ItemText::parse(&"x".repeat(MAX_ITEM_LEN)).is_ok());
        assert!(ItemText::parse(&"x".repeat(MAX_ITEM_LEN + 1)).is_err());
    }

    #[test]
    fn test_rows_are_restartable() {
        let list = List { id: ListId::new(7), created_at: 0 };
        let items = ["Buy peacock feathers", "Use peacock feathers to make a fly"]
            .iter()
            .enumerate()
            .map(|(i, text)| Item {
                list_id: list.id,
                position: i + 1,
                text: text.to_string(),
                created_at: 0,
            })
            .collect();
        let view = ListView { list, items };

        let first: Vec<String> = view.rows().map(|r| r.to_string()).collect();
        let second: Vec<String> = view.rows().map(|r| r.to_string()).collect();
        assert_eq!(
            first,
            vec!["1: Buy peacock feathers", "2: Use peacock feathers to make a fly"]
        );
        assert_eq!(first, second);
        assert_eq!(view.items[1].row_text(), first[1]);
    }
}
