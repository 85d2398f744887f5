//! Selector resolution and predicate polling used by the Action runner's
//! `query`/`waitFor`-style operations.

use std::time::{Duration, Instant};

use futures_timer::Delay;

use crate::cdp::browser_protocol::dom::NodeId;
use crate::element::Element;
use crate::error::{CdpError, Result};
use crate::page::Page;

/// How a set of candidate nodes is located.
#[derive(Debug, Clone)]
pub enum Selector {
    Css(String),
    XPath(String),
    Id(String),
    NodeId(NodeId),
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Selector::Css(css.to_string())
    }
}

impl From<String> for Selector {
    fn from(css: String) -> Self {
        Selector::Css(css)
    }
}

/// A condition checked against the nodes a `Selector` resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// At least one node matches.
    Present,
    /// No node matches.
    NotPresent,
    /// At least `n` nodes match.
    AtLeastN(usize),
    /// At least one matching node has a non-empty box model.
    Visible,
    /// Every matching node has an empty (or missing) box model.
    NotVisible,
    /// At least one matching node lacks a `disabled` attribute.
    Enabled,
    /// At least one matching node carries a `selected` attribute.
    Selected,
}

async fn resolve(page: &Page, selector: &Selector) -> Result<Vec<NodeId>> {
    match selector {
        Selector::Css(css) => {
            let root = page.document_root().await?;
            page.query_selector_all_under(css.clone(), root).await
        }
        Selector::Id(id) => {
            let root = page.document_root().await?;
            page.query_selector_all_under(format!("#{id}"), root).await
        }
        Selector::XPath(expr) => page.xpath_search(expr.clone()).await,
        Selector::NodeId(id) => Ok(vec![*id]),
    }
}

async fn try_once(page: &Page, selector: &Selector, predicate: Predicate) -> Result<Vec<NodeId>> {
    let node_ids = resolve(page, selector).await?;

    match predicate {
        Predicate::NotPresent => {
            return if node_ids.is_empty() {
                Ok(node_ids)
            } else {
                Err(CdpError::HasResults)
            };
        }
        Predicate::AtLeastN(n) => {
            return if node_ids.len() >= n {
                Ok(node_ids)
            } else {
                Err(CdpError::NoResults)
            };
        }
        Predicate::Present => {
            return if node_ids.is_empty() {
                Err(CdpError::NoResults)
            } else {
                Ok(node_ids)
            };
        }
        Predicate::Visible | Predicate::NotVisible | Predicate::Enabled | Predicate::Selected => {
            if node_ids.is_empty() {
                return Err(CdpError::NoResults);
            }
        }
    }

    for &node_id in &node_ids {
        match predicate {
            Predicate::Visible => {
                let (width, height) = page.box_model(node_id).await?;
                if width == 0.0 || height == 0.0 {
                    return Err(CdpError::NotVisible);
                }
            }
            Predicate::NotVisible => {
                if let Ok((width, height)) = page.box_model(node_id).await {
                    if width > 0.0 && height > 0.0 {
                        return Err(CdpError::Visible);
                    }
                }
            }
            Predicate::Enabled => {
                if page.node_attribute(node_id, "disabled").await?.is_some() {
                    return Err(CdpError::Disabled);
                }
            }
            Predicate::Selected => {
                if page.node_attribute(node_id, "selected").await?.is_none() {
                    return Err(CdpError::NotSelected);
                }
            }
            Predicate::Present | Predicate::NotPresent | Predicate::AtLeastN(_) => unreachable!(),
        }
    }

    Ok(node_ids)
}

/// Resolves `selector` and checks `predicate` once, with no retry.
pub async fn query(page: &Page, selector: Selector, predicate: Predicate) -> Result<Vec<Element>> {
    let node_ids = try_once(page, &selector, predicate).await?;
    Element::from_nodes(page, &node_ids).await
}

/// Polls `selector`/`predicate` until it holds or `timeout` elapses.
///
/// Any error `CdpError::is_retryable_predicate()` reports as transient is
/// retried after `poll_interval`; anything else (a transport failure, a
/// malformed selector) is returned immediately.
pub async fn wait_for(
    page: &Page,
    selector: Selector,
    predicate: Predicate,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<Vec<Element>> {
    let deadline = Instant::now() + timeout;
    loop {
        match try_once(page, &selector, predicate).await {
            Ok(node_ids) => return Element::from_nodes(page, &node_ids).await,
            Err(err) if err.is_retryable_predicate() => {
                if Instant::now() >= deadline {
                    return Err(CdpError::SelectorTimeout);
                }
                Delay::new(poll_interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_and_string_selectors_default_to_css() {
        assert!(matches!(Selector::from("div.foo"), Selector::Css(s) if s == "div.foo"));
        assert!(matches!(Selector::from(String::from("div.foo")), Selector::Css(s) if s == "div.foo"));
    }

    #[test]
    fn predicate_is_copy_and_comparable() {
        let a = Predicate::AtLeastN(3);
        let b = a;
        assert_eq!(a, b);
        assert_ne!(Predicate::Visible, Predicate::NotVisible);
    }
}
