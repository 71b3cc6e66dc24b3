use std::fmt;

use crate::{Document, ElementId, MatchingMode, Result};

/// Selector membership test used by the dispatch filter.
pub(crate) trait SelectorMatcher: fmt::Debug {
    fn mode(&self) -> MatchingMode;

    fn matches(&self, document: &dyn Document, element: ElementId, selector: &str)
    -> Result<bool>;
}

#[derive(Debug)]
struct NativeMatcher;

impl SelectorMatcher for NativeMatcher {
    fn mode(&self) -> MatchingMode {
        MatchingMode::Native
    }

    fn matches(
        &self,
        document: &dyn Document,
        element: ElementId,
        selector: &str,
    ) -> Result<bool> {
        document.matches(element, selector)
    }
}

/// Fallback for hosts without a membership test: query every match and look
/// for the element by identity. Cost grows with the number of matches.
#[derive(Debug)]
struct QueryScanMatcher;

impl SelectorMatcher for QueryScanMatcher {
    fn mode(&self) -> MatchingMode {
        MatchingMode::QueryScan
    }

    fn matches(
        &self,
        document: &dyn Document,
        element: ElementId,
        selector: &str,
    ) -> Result<bool> {
        Ok(document
            .query_selector_all(selector)?
            .iter()
            .any(|candidate| *candidate == element))
    }
}

/// Matcher for an already resolved mode (see [`MatchingMode::resolve`]).
pub(crate) fn matcher_for(mode: MatchingMode) -> Box<dyn SelectorMatcher> {
    match mode {
        MatchingMode::QueryScan => Box::new(QueryScanMatcher),
        MatchingMode::Native | MatchingMode::Auto => Box::new(NativeMatcher),
    }
}

#[cfg(all(test, feature = "memory-dom"))]
mod tests {
    use super::*;
    use crate::{Capabilities, MemoryDocument};

    fn check(doc: &MemoryDocument, matcher: &dyn SelectorMatcher) -> Result<()> {
        let list = doc.append(doc.root(), "ul#list")?;
        let item = doc.append(list, "li.item")?;
        assert!(matcher.matches(doc, item, "#list > .item")?);
        assert!(matcher.matches(doc, item, "li, p")?);
        assert!(!matcher.matches(doc, item, "#list")?);
        assert!(!matcher.matches(doc, list, ".item")?);
        assert!(matcher.matches(doc, item, "li:hover").is_err());
        Ok(())
    }

    #[test]
    fn test_native_matcher() -> Result<()> {
        let matcher = matcher_for(MatchingMode::Native);
        assert_eq!(matcher.mode(), MatchingMode::Native);
        check(&MemoryDocument::new(), matcher.as_ref())
    }

    #[test]
    fn test_query_scan_matcher() -> Result<()> {
        let matcher = matcher_for(MatchingMode::QueryScan);
        assert_eq!(matcher.mode(), MatchingMode::QueryScan);
        check(
            &MemoryDocument::with_capabilities(Capabilities::legacy()),
            matcher.as_ref(),
        )
    }

    #[test]
    fn test_query_scan_ignores_detached_elements() -> Result<()> {
        let doc = MemoryDocument::new();
        let item = doc.append(doc.root(), "li.item")?;
        let scan = matcher_for(MatchingMode::QueryScan);
        assert!(scan.matches(&doc, item, ".item")?);
        doc.detach(item)?;
        assert!(!scan.matches(&doc, item, ".item")?);
        Ok(())
    }
}
