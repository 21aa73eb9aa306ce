//! Markup fragment → element tree, driven by the `lol_html` streaming rewriter.

use lol_html::errors::RewritingError;
use lol_html::html_content::EndTag;
use lol_html::{doc_text, element, rewrite_str, RewriteStrSettings};
use std::{cell::RefCell, rc::Rc};

use super::builder::{TreeBuilder, TreeError};
use crate::models::ElementNode;

/// Style of the synthetic root wrapped around every fragment.
pub const ROOT_STYLE: &str = "display: flex; flex-direction: column;";

/// Build the element tree for a markup fragment.
///
/// Failures are logged and reported as `None`; callers decide how fatal
/// that is.
pub fn build_tree(markup: &str) -> Option<ElementNode> {
    match try_build_tree(markup) {
        Ok(tree) => {
            tracing::debug!(elements = tree.element_count(), "Built element tree");
            Some(tree)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build element tree from markup");
            None
        }
    }
}

/// Build the element tree, keeping the failure reason.
pub fn try_build_tree(markup: &str) -> Result<ElementNode, TreeError> {
    let wrapped = format!(r#"<div style="{ROOT_STYLE}">{markup}</div>"#);
    let builder = Rc::new(RefCell::new(TreeBuilder::new()));

    rewrite_str(
        &wrapped,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", {
                    let builder = Rc::clone(&builder);
                    move |el| {
                        let tag = el.tag_name();
                        let attributes: Vec<(String, String)> = el
                            .attributes()
                            .iter()
                            .map(|attr| (attr.name(), attr.value()))
                            .collect();
                        builder.borrow_mut().open(&tag, &attributes)?;

                        match el.end_tag_handlers() {
                            Some(handlers) => {
                                let builder = Rc::clone(&builder);
                                handlers.push(Box::new(move |end: &mut EndTag<'_>| {
                                    builder.borrow_mut().close(&end.name())?;
                                    Ok(())
                                }) as Box<_>);
                            }
                            // Void and self-closing elements never see an end tag.
                            None => builder.borrow_mut().close(&tag)?,
                        }
                        Ok(())
                    }
                }),
            ],
            // Document-level so text outside the root is seen as well.
            document_content_handlers: vec![doc_text!({
                let builder = Rc::clone(&builder);
                move |chunk| {
                    builder.borrow_mut().text(chunk.as_str())?;
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| match e {
        RewritingError::ContentHandlerError(inner) => match inner.downcast::<TreeError>() {
            Ok(tree_error) => *tree_error,
            Err(other) => TreeError::Stream(other.to_string()),
        },
        other => TreeError::Stream(other.to_string()),
    })?;

    let builder = Rc::try_unwrap(builder)
        .map(RefCell::into_inner)
        .map_err(|_| TreeError::Stream("markup handlers still alive".to_string()))?;
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Child, MAX_NESTING_DEPTH};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn child_element(node: &ElementNode, index: usize) -> &ElementNode {
        match &node.children()[index] {
            Child::Element(el) => el,
            other => panic!("expected element at {index}, got {other:?}"),
        }
    }

    #[test]
    fn test_wraps_fragment_in_synthetic_root() {
        let tree = build_tree("<h1>One</h1><h2>Two</h2>").unwrap();

        assert_eq!(tree.tag_name, "div");
        assert_eq!(
            serde_json::Value::Object(tree.style().unwrap().clone()),
            json!({"display": "flex", "flexDirection": "column"})
        );
        assert_eq!(tree.children().len(), 2);
        assert_eq!(child_element(&tree, 0).tag_name, "h1");
        assert_eq!(child_element(&tree, 1).tag_name, "h2");
    }

    #[test]
    fn test_element_count_is_pairs_plus_root() {
        let markup = r#"<div style="display: flex"><p>a</p><p>b <b>c</b></p></div><span>d</span>"#;
        let tree = build_tree(markup).unwrap();
        assert_eq!(tree.element_count(), 5 + 1);
    }

    #[test]
    fn test_text_and_elements_keep_document_order() {
        let tree = build_tree("<p>Hello <b>big</b> world</p>").unwrap();
        let p = child_element(&tree, 0);

        assert_eq!(
            serde_json::to_value(p).unwrap(),
            json!({"type": "p", "props": {"children": [
                "Hello ",
                {"type": "b", "props": {"children": ["big"]}},
                " world"
            ]}})
        );
    }

    #[test]
    fn test_void_element_closed_without_end_tag() {
        let tree =
            build_tree(r#"<div><img src="a.png" width="10" height="10"><p>after</p></div>"#)
                .unwrap();
        let div = child_element(&tree, 0);

        assert_eq!(div.children().len(), 2);
        let img = child_element(div, 0);
        assert_eq!(img.tag_name, "img");
        assert!(img.children().is_empty());
        assert_eq!(child_element(div, 1).tag_name, "p");
    }

    #[test]
    fn test_self_closing_syntax() {
        let tree = build_tree(r#"<img src="a.png" /><span>x</span>"#).unwrap();
        assert_eq!(tree.children().len(), 2);
        assert_eq!(child_element(&tree, 1).tag_name, "span");
    }

    #[test]
    fn test_image_without_height_still_emitted() {
        let tree = build_tree(r#"<img src="https://example.com/a.png" width="40">"#).unwrap();
        let img = child_element(&tree, 0);
        assert_eq!(img.props.src.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(img.props.width, None);
    }

    #[test]
    fn test_special_characters_in_text() {
        let tree = build_tree("<p>say \"hi\"\tback\\slash\nnext</p>").unwrap();
        let p = child_element(&tree, 0);
        let text = "say \"hi\"\tback\\slash\nnext".to_string();
        assert_eq!(p.children(), &[Child::Text(text.clone())]);

        let encoded = serde_json::to_string(&tree).unwrap();
        let decoded: ElementNode = serde_json::from_str(&encoded).unwrap();
        assert_eq!(child_element(&decoded, 0).children(), &[Child::Text(text)]);
    }

    #[test]
    fn test_empty_fragment_yields_bare_root() {
        let tree = build_tree("").unwrap();
        assert_eq!(tree.element_count(), 1);
        assert!(tree.children().is_empty());
    }

    #[test]
    fn test_closing_root_early_is_malformed() {
        assert!(build_tree("</div><p>after</p>").is_none());
        assert!(matches!(
            try_build_tree("</div>tail"),
            Err(TreeError::ContentAfterRoot)
        ));
    }

    #[test]
    fn test_nesting_limit_counts_synthetic_root() {
        let nested = |levels: usize| format!("{}{}", "<b>".repeat(levels), "</b>".repeat(levels));

        let tree = build_tree(&nested(MAX_NESTING_DEPTH - 1)).unwrap();
        assert_eq!(tree.depth(), MAX_NESTING_DEPTH);
        assert_eq!(
            try_build_tree(&nested(MAX_NESTING_DEPTH)).unwrap_err(),
            TreeError::TooDeep(MAX_NESTING_DEPTH)
        );
        assert!(build_tree(&nested(MAX_NESTING_DEPTH)).is_none());
    }

    #[test]
    fn test_unclosed_element_is_closed_implicitly() {
        let tree = build_tree("<section><p>open").unwrap();
        let section = child_element(&tree, 0);
        assert_eq!(section.tag_name, "section");
        assert_eq!(child_element(section, 0).tag_name, "p");
    }
}
