//! Selector - The small CSS subset the core needs
//!
//! Supports `*`, `tag`, `.class`, `#id`, `[attr]`, `[attr=value]` and
//! `[attr="value"]`, combined into compounds (`input[type=text].big`) and
//! separated by commas into alternatives. Combinators are not supported.

use std::str::FromStr;

use super::document::Node;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(&node.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attributes.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = node.attributes.get("class").map(String::as_str).unwrap_or("");
            if !self
                .classes
                .iter()
                .all(|c| class_attr.split_whitespace().any(|have| have == c))
            {
                return false;
            }
        }
        self.attributes.iter().all(|(name, value)| match (node.attributes.get(name), value) {
            (Some(_), None) => true,
            (Some(have), Some(want)) => have == want,
            (None, _) => false,
        })
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

impl Selector {
    /// Shorthand for `[name]`.
    pub fn attribute(name: &str) -> Self {
        Self {
            alternatives: vec![Compound {
                attributes: vec![(name.to_string(), None)],
                ..Compound::default()
            }],
        }
    }

    pub(crate) fn matches(&self, node: &Node) -> bool {
        self.alternatives.iter().any(|c| c.matches(node))
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidSelector(source.to_string());
        let mut alternatives = Vec::new();

        for part in source.split(',') {
            let part = part.trim();
            if part.is_empty() || part.contains(char::is_whitespace) {
                return Err(invalid());
            }
            alternatives.push(parse_compound(part).ok_or_else(invalid)?);
        }

        Ok(Self { alternatives })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    (*pos > start).then(|| chars[start..*pos].iter().collect())
}

fn parse_compound(part: &str) -> Option<Compound> {
    let chars: Vec<char> = part.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if chars.first() == Some(&'*') {
        pos = 1;
    } else if chars.first().is_some_and(|&c| is_ident_char(c)) {
        compound.tag = take_ident(&chars, &mut pos);
    }

    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                compound.classes.push(take_ident(&chars, &mut pos)?);
            }
            '#' => {
                pos += 1;
                compound.id = Some(take_ident(&chars, &mut pos)?);
            }
            '[' => {
                pos += 1;
                let name = take_ident(&chars, &mut pos)?;
                let value = if chars.get(pos) == Some(&'=') {
                    pos += 1;
                    let quote = chars.get(pos).copied().filter(|&c| c == '"' || c == '\'');
                    let value = match quote {
                        Some(q) => {
                            pos += 1;
                            let start = pos;
                            while pos < chars.len() && chars[pos] != q {
                                pos += 1;
                            }
                            let value: String = chars.get(start..pos)?.iter().collect();
                            pos += 1;
                            value
                        }
                        None => take_ident(&chars, &mut pos)?,
                    };
                    Some(value)
                } else {
                    None
                };
                if chars.get(pos) != Some(&']') {
                    return None;
                }
                pos += 1;
                compound.attributes.push((name, value));
            }
            _ => return None,
        }
    }

    Some(compound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn test_attribute_selector() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(doc.body(), a);
        doc.append_child(doc.body(), b);
        doc.set_attribute(b, "data-module-lazyload", "any");

        let selector: Selector = "[data-module-lazyload]".parse().unwrap();
        assert_eq!(doc.query_selector_all(doc.body(), &selector), vec![b]);
    }

    #[test]
    fn test_compound_and_alternatives() {
        let doc = Document::new();
        let input = doc.create_element("input");
        let hidden = doc.create_element("input");
        let select = doc.create_element("select");
        for node in [input, hidden, select] {
            doc.append_child(doc.body(), node);
        }
        doc.set_attribute(input, "type", "text");
        doc.set_attribute(hidden, "type", "hidden");

        let selector: Selector = "input[type=\"text\"], select".parse().unwrap();
        assert_eq!(doc.query_selector_all(doc.body(), &selector), vec![input, select]);
    }

    #[test]
    fn test_class_and_id() {
        let doc = Document::new();
        let el = doc.create_element("p");
        doc.append_child(doc.body(), el);
        doc.set_class_name(el, "lead note");
        doc.set_attribute(el, "id", "intro");

        let selector: Selector = "p.note.lead#intro".parse().unwrap();
        assert_eq!(doc.query_selector_all(doc.body(), &selector), vec![el]);

        let selector: Selector = ".missing".parse().unwrap();
        assert!(doc.query_selector_all(doc.body(), &selector).is_empty());
    }

    #[test]
    fn test_rejects_combinators() {
        assert!("div p".parse::<Selector>().is_err());
        assert!("[open".parse::<Selector>().is_err());
        assert!("".parse::<Selector>().is_err());
    }
}
