use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;

/// One dialogue act item: an act type with an optional slot and value,
/// e.g. `inform(food=Chinese)` or `request(area)` or `hello()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogueActItem {
    pub da_type: String,
    pub slot: Option<String>,
    pub value: Option<String>,
}

impl DialogueActItem {
    pub fn new(da_type: impl Into<String>, slot: Option<&str>, value: Option<&str>) -> Self {
        Self {
            da_type: da_type.into(),
            slot: slot.map(str::to_string),
            value: value.map(str::to_string),
        }
    }
}

impl fmt::Display for DialogueActItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.slot, &self.value) {
            (Some(slot), Some(value)) if needs_quotes(value) => {
                write!(f, "{}({}=\"{}\")", self.da_type, slot, value)
            }
            (Some(slot), Some(value)) => write!(f, "{}({}={})", self.da_type, slot, value),
            (Some(slot), None) => write!(f, "{}({})", self.da_type, slot),
            _ => write!(f, "{}()", self.da_type),
        }
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty() || value.chars().any(|c| matches!(c, ' ' | ',' | '&' | '(' | ')' | '='))
}

/// A dialogue act: an ordered set of [`DialogueActItem`]s.
///
/// The compact textual form joins items with `&`; several slots of the same act type
/// may share one pair of parentheses:
///
/// ```
/// use treeclassif::DialogueAct;
///
/// let da: DialogueAct = "inform(food=Chinese,price=cheap)&request(area)".parse().unwrap();
/// assert_eq!(da.items().len(), 3);
/// assert_eq!(da.to_string(), "inform(food=Chinese)&inform(price=cheap)&request(area)");
/// ```
///
/// `DialogueAct::default()` is the empty act with no items at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogueAct {
    items: Vec<DialogueActItem>,
}

impl DialogueAct {
    pub fn new(items: Vec<DialogueActItem>) -> Self {
        let mut da = Self::default();
        for item in items {
            da.push(item);
        }
        da
    }

    pub fn items(&self) -> &[DialogueActItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds an item; duplicates are ignored so the act stays a set.
    pub fn push(&mut self, item: DialogueActItem) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }
}

impl FromStr for DialogueAct {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut da = DialogueAct::default();
        let s = s.trim();
        if s.is_empty() {
            return Ok(da);
        }
        for part in split_unquoted(s, '&') {
            let part = part.trim();
            let open = part
                .find('(')
                .ok_or_else(|| ClassifierError::Parse(format!("Missing '(' in dialogue act item '{}'", part)))?;
            if !part.ends_with(')') {
                return Err(ClassifierError::Parse(format!(
                    "Missing ')' in dialogue act item '{}'",
                    part
                )));
            }
            let da_type = part[..open].trim();
            if da_type.is_empty() {
                return Err(ClassifierError::Parse(format!("Missing act type in '{}'", part)));
            }
            let args = part[open + 1..part.len() - 1].trim();
            if args.is_empty() {
                da.push(DialogueActItem::new(da_type, None, None));
                continue;
            }
            for arg in split_unquoted(args, ',') {
                let arg = arg.trim();
                let item = match split_unquoted(arg, '=').as_slice() {
                    [slot] => DialogueActItem::new(da_type, Some(slot.trim()), None),
                    [slot, value] => {
                        DialogueActItem::new(da_type, Some(slot.trim()), Some(unquote(value.trim())))
                    }
                    _ => {
                        return Err(ClassifierError::Parse(format!("Invalid slot-value pair '{}'", arg)));
                    }
                };
                if item.slot.as_deref().map_or(true, str::is_empty) {
                    return Err(ClassifierError::Parse(format!("Empty slot name in '{}'", part)));
                }
                da.push(item);
            }
        }
        Ok(da)
    }
}

impl fmt::Display for DialogueAct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.items.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", items.join("&"))
    }
}

/// Splits on `sep` outside of double-quoted sections.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_inform() {
        let da: DialogueAct = "inform()".parse().unwrap();
        assert_eq!(da.items(), &[DialogueActItem::new("inform", None, None)]);
        assert_eq!(da.to_string(), "inform()");
    }

    #[test]
    fn test_parse_quoted_values() {
        let da: DialogueAct = r#"inform(name="Golden Dragon, Ltd",food=Chinese)"#.parse().unwrap();
        assert_eq!(da.items()[0].value.as_deref(), Some("Golden Dragon, Ltd"));
        assert_eq!(da.items()[1].slot.as_deref(), Some("food"));
        let round: DialogueAct = da.to_string().parse().unwrap();
        assert_eq!(round, da);
    }

    #[test]
    fn test_duplicate_items_collapse() {
        let da: DialogueAct = "inform(food=Thai)&inform(food=Thai)".parse().unwrap();
        assert_eq!(da.items().len(), 1);
    }

    #[test]
    fn test_blank_is_empty_act() {
        assert!("".parse::<DialogueAct>().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_acts() {
        assert!("inform".parse::<DialogueAct>().is_err());
        assert!("inform(food=Thai".parse::<DialogueAct>().is_err());
        assert!("(food=Thai)".parse::<DialogueAct>().is_err());
        assert!("inform(=Thai)".parse::<DialogueAct>().is_err());
        assert!("inform(a=b=c)".parse::<DialogueAct>().is_err());
    }
}
