//! Layout - Taffy bridge producing offset rectangles
//!
//! Mirrors the document's connected tree into a `TaffyTree`, using the
//! style stored on each node, computes flexbox layout at a definite size
//! and writes every node's offset box back. Taffy locations are relative
//! to the parent, which is also each node's offset parent here, so the
//! viewport's offset accumulation reproduces absolute page coordinates.

use std::collections::HashMap;

use taffy::{AvailableSpace, NodeId as TaffyNodeId, Size, TaffyTree};

use super::document::{Document, NodeId, OffsetRect};
use crate::error::{Error, Result};

fn layout_error(err: taffy::TaffyError) -> Error {
    Error::Layout(err.to_string())
}

/// Build the taffy mirror of `node`'s subtree, children first.
fn build(
    document: &Document,
    tree: &mut TaffyTree<()>,
    node: NodeId,
    mapping: &mut HashMap<NodeId, TaffyNodeId>,
) -> Result<TaffyNodeId> {
    let children = document
        .children(node)
        .into_iter()
        .map(|child| build(document, tree, child, mapping))
        .collect::<Result<Vec<_>>>()?;

    let style = document.style(node);
    let taffy_node = if children.is_empty() {
        tree.new_leaf(style).map_err(layout_error)?
    } else {
        tree.new_with_children(style, &children).map_err(layout_error)?
    };

    mapping.insert(node, taffy_node);
    Ok(taffy_node)
}

/// Lay out the whole document at `width` × `height` and store offsets.
pub fn compute_offsets(document: &Document, width: f32, height: f32) -> Result<()> {
    let mut tree: TaffyTree<()> = TaffyTree::new();
    let mut mapping = HashMap::new();

    let root = build(document, &mut tree, document.document_element(), &mut mapping)?;

    tree.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(width),
            height: AvailableSpace::Definite(height),
        },
    )
    .map_err(layout_error)?;

    for (node, taffy_node) in mapping {
        let layout = tree.layout(taffy_node).map_err(layout_error)?;
        document.set_offset(
            node,
            OffsetRect::new(
                layout.location.x,
                layout.location.y,
                layout.size.width,
                layout.size.height,
            ),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taffy::{Dimension, FlexDirection, Style};

    fn fixed(width: f32, height: f32) -> Style {
        Style {
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Length(height),
            },
            flex_shrink: 0.0,
            ..Style::default()
        }
    }

    #[test]
    fn test_column_layout_offsets() {
        let doc = Document::new();
        doc.set_style(
            doc.body(),
            Style {
                flex_direction: FlexDirection::Column,
                ..Style::default()
            },
        );
        doc.set_style(
            doc.document_element(),
            Style {
                flex_direction: FlexDirection::Column,
                ..Style::default()
            },
        );

        let first = doc.create_element("div");
        let second = doc.create_element("div");
        doc.set_style(first, fixed(100.0, 500.0));
        doc.set_style(second, fixed(100.0, 300.0));
        doc.append_child(doc.body(), first);
        doc.append_child(doc.body(), second);

        compute_offsets(&doc, 800.0, 600.0).unwrap();

        assert_eq!(doc.offset(first), OffsetRect::new(0.0, 0.0, 100.0, 500.0));
        assert_eq!(doc.offset(second), OffsetRect::new(0.0, 500.0, 100.0, 300.0));
    }
}
