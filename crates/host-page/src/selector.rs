//! CSS selector subset used by the in-memory page.
//!
//! Supported: type selectors, `*`, `#id`, `.class`, attribute tests
//! (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, `[a~=v]`) with bare or quoted
//! values, compound selectors and the descendant combinator.

use std::fmt;
use std::str::FromStr;

use crate::error::PageError;

/// Read access to a node tree that selectors can be matched against.
pub trait SelectorTree {
    type Id: Copy + Eq;

    fn parent(&self, node: Self::Id) -> Option<Self::Id>;
    fn tag(&self, node: Self::Id) -> &str;
    fn attribute(&self, node: Self::Id, name: &str) -> Option<&str>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    /// Compounds joined by descendant combinators, outermost first.
    chain: Vec<Compound>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttrTest>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, PageError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(PageError::invalid_selector(source, "empty selector"));
        }
        let chain = split_compounds(trimmed)
            .map_err(|reason| PageError::invalid_selector(source, reason))?
            .into_iter()
            .map(|part| {
                parse_compound(part).map_err(|reason| PageError::invalid_selector(source, reason))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: trimmed.to_string(),
            chain,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Does `node` match, considering its ancestors for descendant combinators.
    pub fn matches<T: SelectorTree>(&self, tree: &T, node: T::Id) -> bool {
        let Some((last, rest)) = self.chain.split_last() else {
            return false;
        };
        if !last.matches(tree, node) {
            return false;
        }
        // Right-to-left, greedily binding each remaining compound to the
        // nearest matching ancestor. Greedy is exact for descendant-only chains.
        let mut cursor = tree.parent(node);
        for compound in rest.iter().rev() {
            loop {
                match cursor {
                    Some(ancestor) => {
                        cursor = tree.parent(ancestor);
                        if compound.matches(tree, ancestor) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }
}

impl FromStr for Selector {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Compound {
    fn matches<T: SelectorTree>(&self, tree: &T, node: T::Id) -> bool {
        if let Some(tag) = &self.tag {
            if !tree.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.attribute(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = tree.attribute(node, "class").unwrap_or("");
            let present = |wanted: &String| class_attr.split_whitespace().any(|c| c == wanted);
            if !self.classes.iter().all(present) {
                return false;
            }
        }
        self.attributes
            .iter()
            .all(|test| test.matches(tree.attribute(node, &test.name)))
    }
}

impl AttrTest {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == self.value,
            AttrOp::Contains => !self.value.is_empty() && actual.contains(&self.value),
            AttrOp::Prefix => !self.value.is_empty() && actual.starts_with(&self.value),
            AttrOp::Suffix => !self.value.is_empty() && actual.ends_with(&self.value),
            AttrOp::Word => actual.split_whitespace().any(|w| w == self.value),
        }
    }
}

/// Split on whitespace that is outside attribute brackets and quotes.
fn split_compounds(input: &str) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;

    for (idx, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced ']'".to_string())?;
            }
            (None, '>') | (None, '+') | (None, '~') | (None, ',') if depth == 0 => {
                return Err(format!("unsupported combinator '{ch}'"));
            }
            (None, c) if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    parts.push(&input[s..idx]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(idx);
        }
    }
    if quote.is_some() {
        return Err("unterminated quote".to_string());
    }
    if depth != 0 {
        return Err("unterminated '['".to_string());
    }
    if let Some(s) = start {
        parts.push(&input[s..]);
    }
    Ok(parts)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn take_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn parse_compound(part: &str) -> Result<Compound, String> {
    let chars: Vec<char> = part.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if chars.first() == Some(&'*') {
        pos += 1;
    } else {
        let tag = take_ident(&chars, &mut pos);
        if !tag.is_empty() {
            compound.tag = Some(tag);
        }
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                let id = take_ident(&chars, &mut pos);
                if id.is_empty() {
                    return Err("expected id after '#'".into());
                }
                compound.id = Some(id);
            }
            '.' => {
                pos += 1;
                let class = take_ident(&chars, &mut pos);
                if class.is_empty() {
                    return Err("expected class after '.'".into());
                }
                compound.classes.push(class);
            }
            '[' => {
                pos += 1;
                compound.attributes.push(parse_attr(&chars, &mut pos)?);
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(compound)
}

fn parse_attr(chars: &[char], pos: &mut usize) -> Result<AttrTest, String> {
    let name = take_ident(chars, pos);
    if name.is_empty() {
        return Err("expected attribute name".into());
    }
    let op = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttrTest {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }
        Some('=') => {
            *pos += 1;
            AttrOp::Equals
        }
        Some(c @ ('*' | '^' | '$' | '~')) if chars.get(*pos + 1) == Some(&'=') => {
            let op = match c {
                '*' => AttrOp::Contains,
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                _ => AttrOp::Word,
            };
            *pos += 2;
            op
        }
        _ => return Err(format!("malformed attribute test for '{name}'")),
    };

    let value = match chars.get(*pos) {
        Some(q @ ('"' | '\'')) => {
            let q = *q;
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != q {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated quote".into());
            }
            let value: String = chars[start..*pos].iter().collect();
            *pos += 1;
            value
        }
        _ => take_ident(chars, pos),
    };

    if chars.get(*pos) != Some(&']') {
        return Err(format!("expected ']' after attribute '{name}'"));
    }
    *pos += 1;
    Ok(AttrTest { name, op, value })
}
