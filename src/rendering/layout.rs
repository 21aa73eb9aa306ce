//! Flexbox layout over the element tree and SVG emission.
//!
//! Styled elements become taffy nodes. Text runs are measured leaves that
//! wrap at word boundaries using the request's font metrics.

use std::collections::{BTreeSet, HashMap};
use taffy::geometry::{Rect, Size};
use taffy::style::{AvailableSpace, Dimension, Display, Style};
use taffy::{NodeId, TaffyTree};

use super::css::{self, Decoration, TextAlign, TextStyle};
use super::fonts::{FontFamilies, FontMetrics};
use super::text::{self, Line, Segment};
use crate::error::EngineError;
use crate::models::{Child, Dimensions, ElementNode};

/// Element with computed styles.
#[derive(Debug, Clone)]
pub struct StyledElement {
    pub tag: String,
    pub layout: Style,
    pub decoration: Decoration,
    pub text: TextStyle,
    pub image: Option<ImageSource>,
    pub children: Vec<StyledNode>,
}

#[derive(Debug, Clone)]
pub enum StyledNode {
    Element(StyledElement),
    Text(TextRun),
}

#[derive(Debug, Clone)]
pub struct ImageSource {
    pub src: String,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct TextRun {
    pub text: String,
    pub style: TextStyle,
}

fn attr_px(raw: Option<&str>) -> Option<f32> {
    raw.map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

impl StyledElement {
    pub fn from_tree(root: &ElementNode) -> Self {
        Self::from_node(root, &TextStyle::default())
    }

    fn from_node(node: &ElementNode, parent: &TextStyle) -> Self {
        let css::ComputedStyle {
            mut layout,
            decoration,
            text,
        } = css::compute(node.style(), &node.tag_name, parent);

        let image = match (&node.props.src, node.tag_name.as_str()) {
            (Some(src), "img") => Some(ImageSource {
                src: src.clone(),
                width: attr_px(node.props.width.as_deref()),
                height: attr_px(node.props.height.as_deref()),
            }),
            _ => None,
        };
        if let Some(image) = &image {
            // A single given side makes the image square.
            let auto = Dimension::auto();
            if layout.size.width == auto {
                if let Some(w) = image.width.or(image.height) {
                    layout.size.width = Dimension::length(w);
                }
            }
            if layout.size.height == auto {
                if let Some(h) = image.height.or(image.width) {
                    layout.size.height = Dimension::length(h);
                }
            }
        }

        let children = node
            .children()
            .iter()
            .filter_map(|child| match child {
                Child::Element(el) => Some(StyledNode::Element(Self::from_node(el, &text))),
                Child::Text(raw) => {
                    let collapsed = text::collapse_whitespace(raw);
                    (!collapsed.is_empty()).then(|| {
                        StyledNode::Text(TextRun {
                            text: collapsed,
                            style: text.clone(),
                        })
                    })
                }
            })
            .collect();

        Self {
            tag: node.tag_name.clone(),
            layout,
            decoration,
            text,
            image,
            children,
        }
    }

    /// Distinct emoji clusters across all text runs.
    pub fn emoji_clusters(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let StyledNode::Text(run) = node {
                for segment in text::segments(&run.text) {
                    if let Segment::Emoji(cluster) = segment {
                        out.insert(cluster.to_string());
                    }
                }
            }
        });
        out
    }

    /// Distinct remote image sources.
    pub fn remote_images(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if let Some(image) = &self.image {
            if is_remote(&image.src) {
                out.insert(image.src.clone());
            }
        }
        self.visit(&mut |node| {
            if let StyledNode::Element(StyledElement {
                image: Some(image), ..
            }) = node
            {
                if is_remote(&image.src) {
                    out.insert(image.src.clone());
                }
            }
        });
        out
    }

    fn visit<F: FnMut(&StyledNode)>(&self, f: &mut F) {
        for child in &self.children {
            f(child);
            if let StyledNode::Element(el) = child {
                el.visit(f);
            }
        }
    }
}

fn is_remote(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}


/// A positioned box. `x`/`y` are relative to the parent's border box.
#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub content: BoxContent,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    Block {
        decoration: Decoration,
        border: Rect<f32>,
        children: Vec<LayoutBox>,
    },
    Text {
        lines: Vec<TextLine>,
        style: TextStyle,
    },
    Image {
        src: String,
    },
}

/// One wrapped line split into text and emoji pieces.
#[derive(Debug, Clone)]
pub struct TextLine {
    pub text: String,
    pub width: f32,
    pub pieces: Vec<LinePiece>,
}

#[derive(Debug, Clone)]
pub struct LinePiece {
    pub text: String,
    pub emoji: bool,
    pub width: f32,
}

type LayoutTree<'s> = TaffyTree<&'s TextRun>;

fn layout_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Layout(e.to_string())
}

fn canvas_side(length: f32) -> u32 {
    length.ceil().max(1.0) as u32
}

/// Lay out the root for the requested canvas, inferring the missing side.
///
/// Returns the root box and the canvas size in whole pixels.
pub fn layout_document(
    root: &StyledElement,
    dimensions: Dimensions,
    metrics: &mut FontMetrics<'_>,
) -> Result<(LayoutBox, u32, u32), EngineError> {
    let mut tree: LayoutTree<'_> = TaffyTree::new();
    tree.disable_rounding();

    let mut root_style = root.layout.clone();
    let space = match dimensions {
        Dimensions::Both { width, height } => {
            root_style.size = Size {
                width: Dimension::length(width as f32),
                height: Dimension::length(height as f32),
            };
            Size {
                width: AvailableSpace::Definite(width as f32),
                height: AvailableSpace::Definite(height as f32),
            }
        }
        Dimensions::Width(width) => {
            root_style.size.width = Dimension::length(width as f32);
            Size {
                width: AvailableSpace::Definite(width as f32),
                height: AvailableSpace::MaxContent,
            }
        }
        Dimensions::Height(height) => {
            root_style.size.height = Dimension::length(height as f32);
            Size {
                width: AvailableSpace::MaxContent,
                height: AvailableSpace::Definite(height as f32),
            }
        }
    };

    let root_id = add_element(&mut tree, root, root_style)?;
    tree.compute_layout_with_measure(root_id, space, |known, available, _node, context, _style| {
        match context {
            Some(run) => measure_text(metrics, run, known, available),
            None => Size::ZERO,
        }
    })
    .map_err(layout_error)?;

    let root_size = tree.layout(root_id).map_err(layout_error)?.size;
    let (width, height) = match dimensions {
        Dimensions::Both { width, height } => (width, height),
        Dimensions::Width(width) => (width, canvas_side(root_size.height)),
        Dimensions::Height(height) => (canvas_side(root_size.width), height),
    };

    let root_box = convert_element(&tree, root_id, root, metrics)?;
    Ok((root_box, width, height))
}

fn add_node<'s>(tree: &mut LayoutTree<'s>, node: &'s StyledNode) -> Result<NodeId, EngineError> {
    match node {
        StyledNode::Text(run) => tree
            .new_leaf_with_context(Style::default(), run)
            .map_err(layout_error),
        StyledNode::Element(el) => add_element(tree, el, el.layout.clone()),
    }
}

fn add_element<'s>(
    tree: &mut LayoutTree<'s>,
    el: &'s StyledElement,
    style: Style,
) -> Result<NodeId, EngineError> {
    if el.image.is_some() {
        return tree.new_leaf(style).map_err(layout_error);
    }
    let children = el
        .children
        .iter()
        .map(|child| add_node(tree, child))
        .collect::<Result<Vec<_>, _>>()?;
    tree.new_with_children(style, &children)
        .map_err(layout_error)
}

/// Size of a text leaf: wrapped at the known or available width.
fn measure_text(
    metrics: &mut FontMetrics<'_>,
    run: &TextRun,
    known: Size<Option<f32>>,
    available: Size<AvailableSpace>,
) -> Size<f32> {
    if let Size {
        width: Some(width),
        height: Some(height),
    } = known
    {
        return Size { width, height };
    }

    let limit = known.width.unwrap_or(match available.width {
        AvailableSpace::Definite(width) => width,
        AvailableSpace::MinContent => 0.0,
        AvailableSpace::MaxContent => f32::INFINITY,
    });
    let lines = text::wrap(&run.text, limit, |s| metrics.width(s, &run.style));
    let widest = lines.iter().map(|line| line.width).fold(0.0, f32::max);

    Size {
        width: known.width.unwrap_or(widest),
        height: known
            .height
            .unwrap_or(lines.len() as f32 * run.style.line_height_px()),
    }
}

fn convert_node(
    tree: &LayoutTree<'_>,
    id: NodeId,
    node: &StyledNode,
    metrics: &mut FontMetrics<'_>,
) -> Result<Option<LayoutBox>, EngineError> {
    match node {
        StyledNode::Element(el) if el.layout.display == Display::None => Ok(None),
        StyledNode::Element(el) => convert_element(tree, id, el, metrics).map(Some),
        StyledNode::Text(run) => {
            let layout = tree.layout(id).map_err(layout_error)?;
            let (x, y, width, height) = (
                layout.location.x,
                layout.location.y,
                layout.size.width,
                layout.size.height,
            );
            let lines = text::wrap(&run.text, width, |s| metrics.width(s, &run.style))
                .into_iter()
                .map(|line| text_line(line, &run.style, metrics))
                .collect();

            Ok(Some(LayoutBox {
                x,
                y,
                width,
                height,
                content: BoxContent::Text {
                    lines,
                    style: run.style.clone(),
                },
            }))
        }
    }
}

fn convert_element(
    tree: &LayoutTree<'_>,
    id: NodeId,
    el: &StyledElement,
    metrics: &mut FontMetrics<'_>,
) -> Result<LayoutBox, EngineError> {
    let layout = tree.layout(id).map_err(layout_error)?;
    let (x, y, width, height, border) = (
        layout.location.x,
        layout.location.y,
        layout.size.width,
        layout.size.height,
        layout.border,
    );

    let content = match &el.image {
        Some(image) => BoxContent::Image {
            src: image.src.clone(),
        },
        None => {
            let ids = tree.children(id).map_err(layout_error)?;
            let mut children = Vec::with_capacity(ids.len());
            for (child_id, child) in ids.into_iter().zip(&el.children) {
                if let Some(child_box) = convert_node(tree, child_id, child, metrics)? {
                    children.push(child_box);
                }
            }
            BoxContent::Block {
                decoration: el.decoration.clone(),
                border,
                children,
            }
        }
    };

    Ok(LayoutBox {
        x,
        y,
        width,
        height,
        content,
    })
}

fn text_line(line: Line, style: &TextStyle, metrics: &mut FontMetrics<'_>) -> TextLine {
    let pieces = text::segments(&line.text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Emoji(cluster) => LinePiece {
                text: cluster.to_string(),
                emoji: true,
                width: style.font_size,
            },
            Segment::Text(run) => LinePiece {
                text: run.to_string(),
                emoji: false,
                width: metrics.width(run, style),
            },
        })
        .collect();

    TextLine {
        text: line.text,
        width: line.width,
        pieces,
    }
}

/// External resources referenced while painting.
#[derive(Debug, Default)]
pub struct PaintResources {
    pub families: FontFamilies,
    /// Emoji cluster to `data:` URI
    pub glyphs: HashMap<String, String>,
    /// Remote image URL to `data:` URI
    pub images: HashMap<String, String>,
}

impl PaintResources {
    fn image_href<'a>(&'a self, src: &'a str) -> Option<&'a str> {
        if src.starts_with("data:") {
            Some(src)
        } else {
            self.images.get(src).map(String::as_str)
        }
    }
}

fn escape(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn num(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

/// Serialize the laid out document as SVG.
pub fn paint(root: &LayoutBox, width: u32, height: u32, resources: &PaintResources) -> String {
    let mut out = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    paint_box(&mut out, root, 0.0, 0.0, resources);
    out.push_str("</svg>");
    out
}

fn paint_box(out: &mut String, b: &LayoutBox, origin_x: f32, origin_y: f32, res: &PaintResources) {
    let x = origin_x + b.x;
    let y = origin_y + b.y;

    match &b.content {
        BoxContent::Block {
            decoration,
            border,
            children,
        } => {
            let opacity = decoration.opacity.filter(|o| *o < 1.0);
            if let Some(opacity) = opacity {
                out.push_str(&format!(r#"<g opacity="{opacity}">"#));
            }

            if b.width > 0.0 && b.height > 0.0 {
                if let Some(background) = &decoration.background {
                    out.push_str(&format!(
                        r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{}" fill="{}"/>"#,
                        num(x),
                        num(y),
                        num(b.width),
                        num(b.height),
                        num(decoration.border_radius),
                        escape(background)
                    ));
                }
                paint_border(out, x, y, b.width, b.height, border, decoration);
            }

            for child in children {
                paint_box(out, child, x, y, res);
            }

            if opacity.is_some() {
                out.push_str("</g>");
            }
        }
        BoxContent::Text { lines, style } => paint_text(out, lines, style, x, y, b.width, res),
        BoxContent::Image { src } => match res.image_href(src) {
            Some(href) => out.push_str(&format!(
                r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"/>"#,
                num(x),
                num(y),
                num(b.width),
                num(b.height),
                escape(href)
            )),
            None => tracing::debug!(src = %src, "Skipping unavailable image"),
        },
    }
}

/// Uniform borders are stroked with the corner radius; mixed widths are
/// filled side by side.
fn paint_border(
    out: &mut String,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    border: &Rect<f32>,
    decoration: &Decoration,
) {
    let color = escape(&decoration.border_color);
    let uniform =
        border.top == border.right && border.right == border.bottom && border.bottom == border.left;

    if uniform {
        if border.top > 0.0 {
            let inset = border.top / 2.0;
            out.push_str(&format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{}" fill="none" stroke="{color}" stroke-width="{}"/>"#,
                num(x + inset),
                num(y + inset),
                num((width - border.top).max(0.0)),
                num((height - border.top).max(0.0)),
                num((decoration.border_radius - inset).max(0.0)),
                num(border.top)
            ));
        }
        return;
    }

    let sides = [
        (x, y, width, border.top),
        (x, y + height - border.bottom, width, border.bottom),
        (x, y, border.left, height),
        (x + width - border.right, y, border.right, height),
    ];
    for (side_x, side_y, side_w, side_h) in sides {
        if side_w > 0.0 && side_h > 0.0 {
            out.push_str(&format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{color}"/>"#,
                num(side_x),
                num(side_y),
                num(side_w),
                num(side_h)
            ));
        }
    }
}

fn paint_text(
    out: &mut String,
    lines: &[TextLine],
    style: &TextStyle,
    x: f32,
    y: f32,
    width: f32,
    res: &PaintResources,
) {
    let font_size = style.font_size;
    let line_height = style.line_height_px();
    let attrs = format!(
        r#"font-family="{}" font-size="{}" font-weight="{}"{} fill="{}" xml:space="preserve""#,
        escape(&res.families.resolve(style.font_family.as_deref())),
        num(font_size),
        style.font_weight,
        if style.italic {
            r#" font-style="italic""#
        } else {
            ""
        },
        escape(&style.color)
    );

    for (i, line) in lines.iter().enumerate() {
        let top = y + i as f32 * line_height;
        let glyph_top = top + (line_height - font_size) / 2.0;
        let baseline = glyph_top + font_size * 0.8;

        let glyph = |piece: &LinePiece| {
            res.glyphs
                .get(&piece.text)
                .filter(|_| piece.emoji)
                .map(String::as_str)
        };
        if !line.pieces.iter().any(|piece| glyph(piece).is_some()) {
            let (anchor, anchor_x) = match style.text_align {
                TextAlign::Left => ("start", x),
                TextAlign::Center => ("middle", x + width / 2.0),
                TextAlign::Right => ("end", x + width),
            };
            out.push_str(&format!(
                r#"<text x="{}" y="{}" text-anchor="{anchor}" {attrs}>{}</text>"#,
                num(anchor_x),
                num(baseline),
                escape(&line.text)
            ));
            continue;
        }

        let mut cursor = match style.text_align {
            TextAlign::Left => x,
            TextAlign::Center => x + (width - line.width) / 2.0,
            TextAlign::Right => x + width - line.width,
        };
        for piece in &line.pieces {
            match glyph(piece) {
                Some(href) => out.push_str(&format!(
                    r#"<image x="{}" y="{}" width="{}" height="{}" xlink:href="{}"/>"#,
                    num(cursor),
                    num(glyph_top),
                    num(font_size),
                    num(font_size),
                    escape(href)
                )),
                None => out.push_str(&format!(
                    r#"<text x="{}" y="{}" {attrs}>{}</text>"#,
                    num(cursor),
                    num(baseline),
                    escape(&piece.text)
                )),
            }
            cursor += piece.width;
        }
    }
}
