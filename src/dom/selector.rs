use crate::{ElementId, Error, Result};

/// Read access to an element tree, enough to evaluate a [`Selector`].
pub(crate) trait ElementTree {
    fn parent(&self, element: ElementId) -> Option<ElementId>;
    fn previous_sibling(&self, element: ElementId) -> Option<ElementId>;
    fn tag(&self, element: ElementId) -> Option<&str>;
    fn attribute(&self, element: ElementId, name: &str) -> Option<&str>;

    fn has_class(&self, element: ElementId, class_name: &str) -> bool {
        self.attribute(element, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    Includes { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
}

impl AttrCondition {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            AttrCondition::Exists { .. } => true,
            AttrCondition::Eq { value, .. } => actual == value,
            AttrCondition::Includes { value, .. } => {
                actual.split_ascii_whitespace().any(|v| v == value)
            }
            AttrCondition::StartsWith { value, .. } => {
                !value.is_empty() && actual.starts_with(value.as_str())
            }
            AttrCondition::EndsWith { value, .. } => {
                !value.is_empty() && actual.ends_with(value.as_str())
            }
            AttrCondition::Contains { value, .. } => {
                !value.is_empty() && actual.contains(value.as_str())
            }
        }
    }

    fn key(&self) -> &str {
        match self {
            AttrCondition::Exists { key }
            | AttrCondition::Eq { key, .. }
            | AttrCondition::Includes { key, .. }
            | AttrCondition::StartsWith { key, .. }
            | AttrCondition::EndsWith { key, .. }
            | AttrCondition::Contains { key, .. } => key,
        }
    }
}

/// One compound selector, e.g. `button#next.primary[type=submit]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub tag: Option<String>,
    pub universal: bool,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrCondition>,
}

impl Compound {
    pub fn parse(part: &str) -> Result<Compound> {
        let part = part.trim();
        if part.is_empty() {
            return Err(Error::invalid_selector(part, "empty compound selector"));
        }

        let bytes = part.as_bytes();
        let mut i = 0usize;
        let mut compound = Compound::default();

        while i < bytes.len() {
            match bytes[i] {
                b'*' => {
                    if compound.universal || compound.tag.is_some() || i != 0 {
                        return Err(Error::invalid_selector(part, "misplaced '*'"));
                    }
                    compound.universal = true;
                    i += 1;
                }
                b'#' => {
                    let (id, next) = parse_ident(part, i + 1)
                        .ok_or_else(|| Error::invalid_selector(part, "expected id after '#'"))?;
                    if compound.id.replace(id).is_some() {
                        return Err(Error::invalid_selector(part, "more than one id"));
                    }
                    i = next;
                }
                b'.' => {
                    let (class_name, next) = parse_ident(part, i + 1).ok_or_else(|| {
                        Error::invalid_selector(part, "expected class name after '.'")
                    })?;
                    compound.classes.push(class_name);
                    i = next;
                }
                b'[' => {
                    let (cond, next) = parse_attr_condition(part, i)?;
                    compound.attrs.push(cond);
                    i = next;
                }
                b':' => {
                    return Err(Error::invalid_selector(
                        part,
                        "pseudo-classes are not supported",
                    ));
                }
                _ => {
                    if i != 0 {
                        return Err(Error::invalid_selector(part, "type selector must come first"));
                    }
                    let (tag, next) = parse_ident(part, i)
                        .ok_or_else(|| Error::invalid_selector(part, "unexpected character"))?;
                    compound.tag = Some(tag);
                    i = next;
                }
            }
        }

        Ok(compound)
    }

    fn matches<T: ElementTree + ?Sized>(&self, tree: &T, element: ElementId) -> bool {
        let Some(tag) = tree.tag(element) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if !tag.eq_ignore_ascii_case(expected) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.attribute(element, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if self.classes.iter().any(|c| !tree.has_class(element, c)) {
            return false;
        }
        self.attrs
            .iter()
            .all(|cond| cond.matches(tree.attribute(element, cond.key())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    compound: Compound,
    // Relation to the part on the left.
    combinator: Option<Combinator>,
}

/// A parsed selector list (`a, b > c`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selector {
    groups: Vec<Vec<Part>>,
}

impl Selector {
    pub fn parse(selector: &str) -> Result<Selector> {
        let groups = split_outside_brackets(selector, |ch| ch == ',', true)?
            .into_iter()
            .map(|group| parse_chain(selector, &group))
            .collect::<Result<Vec<_>>>()?;
        Ok(Selector { groups })
    }

    /// The id this selector names when it's a bare `#id`.
    pub fn id_only(&self) -> Option<&str> {
        match self.groups.as_slice() {
            [chain] if chain.len() == 1 => {
                let c = &chain[0].compound;
                if c.tag.is_none() && !c.universal && c.classes.is_empty() && c.attrs.is_empty() {
                    c.id.as_deref()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn matches<T: ElementTree + ?Sized>(&self, tree: &T, element: ElementId) -> bool {
        self.groups
            .iter()
            .any(|chain| matches_chain(tree, element, chain))
    }
}

fn matches_chain<T: ElementTree + ?Sized>(tree: &T, element: ElementId, parts: &[Part]) -> bool {
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };
    if !last.compound.matches(tree, element) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }

    match last.combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => tree
            .parent(element)
            .is_some_and(|parent| matches_chain(tree, parent, rest)),
        Combinator::AdjacentSibling => tree
            .previous_sibling(element)
            .is_some_and(|sibling| matches_chain(tree, sibling, rest)),
        // Non-adjacent combinators need backtracking: an outer candidate may
        // satisfy the left compound while failing further up the chain.
        Combinator::Descendant => {
            let mut cursor = tree.parent(element);
            while let Some(ancestor) = cursor {
                if matches_chain(tree, ancestor, rest) {
                    return true;
                }
                cursor = tree.parent(ancestor);
            }
            false
        }
        Combinator::GeneralSibling => {
            let mut cursor = tree.previous_sibling(element);
            while let Some(sibling) = cursor {
                if matches_chain(tree, sibling, rest) {
                    return true;
                }
                cursor = tree.previous_sibling(sibling);
            }
            false
        }
    }
}

fn parse_chain(selector: &str, group: &str) -> Result<Vec<Part>> {
    let mut parts: Vec<Part> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize(group)? {
        let combinator = match token.as_str() {
            ">" => Some(Combinator::Child),
            "+" => Some(Combinator::AdjacentSibling),
            "~" => Some(Combinator::GeneralSibling),
            _ => None,
        };
        if let Some(combinator) = combinator {
            if pending.is_some() || parts.is_empty() {
                return Err(Error::invalid_selector(selector, "dangling combinator"));
            }
            pending = Some(combinator);
            continue;
        }

        let compound = Compound::parse(&token).map_err(|e| match e {
            Error::InvalidSelector { reason, .. } => Error::invalid_selector(selector, reason),
            other => other,
        })?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part {
            compound,
            combinator,
        });
    }

    if parts.is_empty() || pending.is_some() {
        return Err(Error::invalid_selector(selector, "dangling combinator"));
    }
    Ok(parts)
}

fn tokenize(group: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;

    for ch in group.chars() {
        match ch {
            '[' if !in_brackets => {
                in_brackets = true;
                current.push(ch);
            }
            ']' if in_brackets => {
                in_brackets = false;
                current.push(ch);
            }
            '>' | '+' | '~' if !in_brackets => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            ch if ch.is_ascii_whitespace() && !in_brackets => flush(&mut current, &mut tokens),
            _ => current.push(ch),
        }
    }
    if in_brackets {
        return Err(Error::invalid_selector(group, "unclosed '['"));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

fn split_outside_brackets(
    selector: &str,
    is_separator: impl Fn(char) -> bool,
    reject_empty: bool,
) -> Result<Vec<String>> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                if depth == 0 {
                    return Err(Error::invalid_selector(selector, "unbalanced ']'"));
                }
                depth -= 1;
                current.push(ch);
            }
            ch if depth == 0 && is_separator(ch) => {
                let trimmed = current.trim();
                if trimmed.is_empty() && reject_empty {
                    return Err(Error::invalid_selector(selector, "empty selector in list"));
                }
                pieces.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if depth != 0 {
        return Err(Error::invalid_selector(selector, "unclosed '['"));
    }
    let trimmed = current.trim();
    if trimmed.is_empty() && reject_empty {
        return Err(Error::invalid_selector(selector, "empty selector"));
    }
    pieces.push(trimmed.to_string());
    Ok(pieces)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
}

fn parse_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let tail = src.get(start..)?;
    let len: usize = tail
        .chars()
        .take_while(|ch| is_ident_char(*ch))
        .map(char::len_utf8)
        .sum();
    if len == 0 {
        return None;
    }
    Some((tail[..len].to_string(), start + len))
}

fn parse_attr_condition(part: &str, start: usize) -> Result<(AttrCondition, usize)> {
    let close = part[start..]
        .find(']')
        .map(|offset| start + offset)
        .ok_or_else(|| Error::invalid_selector(part, "unclosed '['"))?;
    let body = part[start + 1..close].trim();

    let Some(eq) = body.find('=') else {
        let key = attr_name(part, body)?;
        return Ok((AttrCondition::Exists { key }, close + 1));
    };

    let (name, op) = match body[..eq].chars().last() {
        Some(op @ ('~' | '^' | '$' | '*' | '|')) => (&body[..eq - 1], Some(op)),
        _ => (&body[..eq], None),
    };
    let key = attr_name(part, name)?;
    let value = unquote(body[eq + 1..].trim())
        .ok_or_else(|| Error::invalid_selector(part, "bad attribute value"))?;

    let cond = match op {
        None => AttrCondition::Eq { key, value },
        Some('~') => AttrCondition::Includes { key, value },
        Some('^') => AttrCondition::StartsWith { key, value },
        Some('$') => AttrCondition::EndsWith { key, value },
        Some('*') => AttrCondition::Contains { key, value },
        Some(_) => return Err(Error::invalid_selector(part, "'|=' is not supported")),
    };
    Ok((cond, close + 1))
}

fn attr_name(part: &str, raw: &str) -> Result<String> {
    let raw = raw.trim();
    match parse_ident(raw, 0) {
        Some((name, len)) if len == raw.len() => Ok(name),
        _ => Err(Error::invalid_selector(part, "bad attribute name")),
    }
}

fn unquote(raw: &str) -> Option<String> {
    for quote in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(quote) {
            return inner.strip_suffix(quote).map(str::to_string);
        }
    }
    if raw.is_empty() || !raw.chars().all(is_ident_char) {
        return None;
    }
    Some(raw.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct Tree {
        nodes: Vec<(Option<usize>, String, HashMap<String, String>)>,
    }

    impl Tree {
        fn add(&mut self, parent: Option<usize>, tag: &str, attrs: &[(&str, &str)]) -> ElementId {
            let attrs = attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.nodes.push((parent, tag.to_string(), attrs));
            ElementId::new(self.nodes.len() as u64 - 1)
        }
    }

    impl ElementTree for Tree {
        fn parent(&self, element: ElementId) -> Option<ElementId> {
            self.nodes[element.raw() as usize]
                .0
                .map(|p| ElementId::new(p as u64))
        }

        fn previous_sibling(&self, element: ElementId) -> Option<ElementId> {
            let idx = element.raw() as usize;
            let parent = self.nodes[idx].0;
            (0..idx)
                .rev()
                .find(|i| self.nodes[*i].0 == parent && parent.is_some())
                .map(|i| ElementId::new(i as u64))
        }

        fn tag(&self, element: ElementId) -> Option<&str> {
            Some(&self.nodes[element.raw() as usize].1)
        }

        fn attribute(&self, element: ElementId, name: &str) -> Option<&str> {
            self.nodes[element.raw() as usize]
                .2
                .get(name)
                .map(String::as_str)
        }
    }

    fn sample() -> (Tree, ElementId, ElementId, ElementId) {
        let mut tree = Tree::default();
        let html = tree.add(None, "html", &[]);
        let nav = tree.add(Some(html.raw() as usize), "nav", &[("id", "menu"), ("class", "top bar")]);
        let parent = Some(nav.raw() as usize);
        let link = tree.add(parent, "a", &[("href", "/home"), ("class", "link")]);
        let button = tree.add(parent, "button", &[("id", "next"), ("data-step", "2")]);
        (tree, nav, link, button)
    }

    #[test]
    fn test_compound_selectors() {
        let (tree, nav, link, button) = sample();
        assert!(Selector::parse("#menu").unwrap().matches(&tree, nav));
        assert!(Selector::parse("nav.top.bar").unwrap().matches(&tree, nav));
        assert!(!Selector::parse("nav.missing").unwrap().matches(&tree, nav));
        assert!(Selector::parse("a[href^='/ho']").unwrap().matches(&tree, link));
        assert!(Selector::parse("[data-step=\"2\"]").unwrap().matches(&tree, button));
        assert!(Selector::parse("*").unwrap().matches(&tree, button));
        assert!(Selector::parse("BUTTON").unwrap().matches(&tree, button));
    }

    #[test]
    fn test_combinators_and_groups() {
        let (tree, _, link, button) = sample();
        assert!(Selector::parse("html a").unwrap().matches(&tree, link));
        assert!(Selector::parse("#menu > .link").unwrap().matches(&tree, link));
        assert!(!Selector::parse("html > .link").unwrap().matches(&tree, link));
        assert!(Selector::parse("a + #next").unwrap().matches(&tree, button));
        assert!(Selector::parse("a ~ button").unwrap().matches(&tree, button));
        assert!(!Selector::parse("button ~ a").unwrap().matches(&tree, link));
        assert!(Selector::parse("p, #next").unwrap().matches(&tree, button));
    }

    #[test]
    fn test_id_only() {
        assert_eq!(Selector::parse("#next").unwrap().id_only(), Some("next"));
        assert_eq!(Selector::parse("a#next").unwrap().id_only(), None);
        assert_eq!(Selector::parse("#a, #b").unwrap().id_only(), None);
    }

    #[test]
    fn test_invalid_selectors() {
        for bad in ["", "  ", "a,", "> a", "a >", "a:hover", "#", "[x", "a]", "a[b|=c]", "a*"] {
            assert!(
                matches!(Selector::parse(bad), Err(Error::InvalidSelector { .. })),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_compound_parse_for_markup() {
        let c = Compound::parse("button#go.primary.wide[type=submit]").unwrap();
        assert_eq!(c.tag.as_deref(), Some("button"));
        assert_eq!(c.id.as_deref(), Some("go"));
        assert_eq!(c.classes, vec!["primary", "wide"]);
        assert_eq!(
            c.attrs,
            vec![AttrCondition::Eq {
                key: "type".into(),
                value: "submit".into()
            }]
        );
    }
}
