//! Inline styles mapped onto taffy layout styles, paint decoration and the
//! inherited text style.

use serde_json::Value;
use taffy::geometry::{Rect, Size};
use taffy::style::{
    AlignContent, AlignItems, Dimension, Display, FlexDirection, FlexWrap, JustifyContent,
    LengthPercentage, LengthPercentageAuto, Position, Style,
};

use crate::models::StyleMap;

pub const DEFAULT_FONT_SIZE: f32 = 16.0;
const ROOT_FONT_SIZE: f32 = 16.0;
const NORMAL_LINE_HEIGHT: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f32),
    Percent(f32),
}

/// `12px`, `12`, `50%`, `1.5em`, `2rem`. `auto` and unknown units are `None`.
pub fn parse_length(raw: &str, font_size: f32) -> Option<Length> {
    let raw = raw.trim();
    let number = |s: &str| s.trim().parse::<f32>().ok().filter(|v| v.is_finite());

    if let Some(v) = raw.strip_suffix("px") {
        number(v).map(Length::Px)
    } else if let Some(v) = raw.strip_suffix('%') {
        number(v).map(Length::Percent)
    } else if let Some(v) = raw.strip_suffix("rem") {
        number(v).map(|v| Length::Px(v * ROOT_FONT_SIZE))
    } else if let Some(v) = raw.strip_suffix("em") {
        number(v).map(|v| Length::Px(v * font_size))
    } else {
        number(raw).map(Length::Px)
    }
}

fn dimension(raw: &str, font_size: f32) -> Option<Dimension> {
    if raw.trim() == "auto" {
        return Some(Dimension::auto());
    }
    parse_length(raw, font_size).map(|length| match length {
        Length::Px(px) => Dimension::length(px),
        Length::Percent(pct) => Dimension::percent(pct / 100.0),
    })
}

fn length_percentage(raw: &str, font_size: f32) -> Option<LengthPercentage> {
    parse_length(raw, font_size).map(|length| match length {
        Length::Px(px) => LengthPercentage::length(px),
        Length::Percent(pct) => LengthPercentage::percent(pct / 100.0),
    })
}

fn length_percentage_auto(raw: &str, font_size: f32) -> Option<LengthPercentageAuto> {
    if raw.trim() == "auto" {
        return Some(LengthPercentageAuto::auto());
    }
    parse_length(raw, font_size).map(|length| match length {
        Length::Px(px) => LengthPercentageAuto::length(px),
        Length::Percent(pct) => LengthPercentageAuto::percent(pct / 100.0),
    })
}

fn value_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHeight {
    Multiplier(f32),
    Px(f32),
}

/// Inherited text properties.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: String,
    pub font_size: f32,
    pub font_weight: u16,
    pub italic: bool,
    pub font_family: Option<String>,
    pub text_align: TextAlign,
    pub line_height: LineHeight,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: "black".to_string(),
            font_size: DEFAULT_FONT_SIZE,
            font_weight: 400,
            italic: false,
            font_family: None,
            text_align: TextAlign::Left,
            line_height: LineHeight::Multiplier(NORMAL_LINE_HEIGHT),
        }
    }
}

impl TextStyle {
    pub fn line_height_px(&self) -> f32 {
        match self.line_height {
            LineHeight::Multiplier(m) => m * self.font_size,
            LineHeight::Px(px) => px,
        }
    }
}

/// Painted, non-layout box properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoration {
    pub background: Option<String>,
    /// Falls back to the element's text color
    pub border_color: String,
    pub border_radius: f32,
    pub opacity: Option<f32>,
}

/// Everything computed for one element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    pub layout: Style,
    pub decoration: Decoration,
    pub text: TextStyle,
}

/// Default text presets for common tags.
fn tag_preset(tag: &str, text: &mut TextStyle) {
    let heading = |text: &mut TextStyle, em: f32| {
        text.font_size *= em;
        text.font_weight = 700;
    };
    match tag {
        "h1" => heading(text, 2.0),
        "h2" => heading(text, 1.5),
        "h3" => heading(text, 1.17),
        "h4" => heading(text, 1.0),
        "h5" => heading(text, 0.83),
        "h6" => heading(text, 0.67),
        "b" | "strong" => text.font_weight = 700,
        "i" | "em" => text.italic = true,
        "small" => text.font_size *= 0.83,
        _ => {}
    }
}

fn parse_font_weight(raw: &str) -> Option<u16> {
    match raw {
        "normal" => Some(400),
        "bold" => Some(700),
        "lighter" => Some(300),
        "bolder" => Some(800),
        other => other.parse::<u16>().ok().map(|w| w.clamp(1, 1000)),
    }
}

fn compute_text(get: &impl Fn(&str) -> Option<String>, tag: &str, parent: &TextStyle) -> TextStyle {
    let mut text = parent.clone();
    tag_preset(tag, &mut text);

    match get("fontSize").and_then(|v| parse_length(&v, parent.font_size)) {
        Some(Length::Px(px)) => text.font_size = px,
        Some(Length::Percent(pct)) => text.font_size = parent.font_size * pct / 100.0,
        None => {}
    }

    if let Some(color) = get("color") {
        text.color = color;
    }
    if let Some(weight) = get("fontWeight").and_then(|v| parse_font_weight(&v)) {
        text.font_weight = weight;
    }
    if let Some(font_style) = get("fontStyle") {
        text.italic = font_style == "italic" || font_style == "oblique";
    }
    if let Some(family) = get("fontFamily") {
        text.font_family = Some(family);
    }
    if let Some(align) = get("textAlign") {
        text.text_align = match align.as_str() {
            "center" => TextAlign::Center,
            "right" | "end" => TextAlign::Right,
            _ => TextAlign::Left,
        };
    }
    if let Some(raw) = get("lineHeight") {
        text.line_height = match raw.parse::<f32>() {
            Ok(m) => LineHeight::Multiplier(m),
            Err(_) if raw == "normal" => LineHeight::Multiplier(NORMAL_LINE_HEIGHT),
            Err(_) => match parse_length(&raw, text.font_size) {
                Some(Length::Px(px)) => LineHeight::Px(px),
                Some(Length::Percent(pct)) => LineHeight::Multiplier(pct / 100.0),
                None => text.line_height,
            },
        };
    }
    text
}

fn justify_content(raw: &str) -> Option<JustifyContent> {
    match raw {
        "start" => Some(JustifyContent::Start),
        "end" => Some(JustifyContent::End),
        "flex-start" | "left" => Some(JustifyContent::FlexStart),
        "flex-end" | "right" => Some(JustifyContent::FlexEnd),
        "center" => Some(JustifyContent::Center),
        "stretch" => Some(JustifyContent::Stretch),
        "space-between" => Some(JustifyContent::SpaceBetween),
        "space-around" => Some(JustifyContent::SpaceAround),
        "space-evenly" => Some(JustifyContent::SpaceEvenly),
        _ => None,
    }
}

fn align_items(raw: &str) -> Option<AlignItems> {
    match raw {
        "start" => Some(AlignItems::Start),
        "end" => Some(AlignItems::End),
        "flex-start" => Some(AlignItems::FlexStart),
        "flex-end" => Some(AlignItems::FlexEnd),
        "center" => Some(AlignItems::Center),
        "baseline" => Some(AlignItems::Baseline),
        "stretch" => Some(AlignItems::Stretch),
        _ => None,
    }
}

fn align_content(raw: &str) -> Option<AlignContent> {
    justify_content(raw)
}

/// Top, right, bottom and left of a one to four value shorthand.
fn sides(raw: &str) -> Option<[&str; 4]> {
    match raw.split_whitespace().collect::<Vec<_>>().as_slice() {
        [all] => Some([*all, *all, *all, *all]),
        [v, h] => Some([*v, *h, *v, *h]),
        [t, h, b] => Some([*t, *h, *b, *h]),
        [t, r, b, l] => Some([*t, *r, *b, *l]),
        _ => None,
    }
}

/// Box edges from `{prefix}{suffix}` and its per-side longhands such as
/// `{prefix}Top{suffix}`.
fn edges<T, G, P>(get: &G, prefix: &str, suffix: &str, initial: Rect<T>, parse: P) -> Rect<T>
where
    T: Copy,
    G: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let mut rect = initial;
    if let Some(shorthand) = get(&format!("{prefix}{suffix}")) {
        if let Some([top, right, bottom, left]) = sides(&shorthand) {
            if let (Some(t), Some(r), Some(b), Some(l)) =
                (parse(top), parse(right), parse(bottom), parse(left))
            {
                rect = Rect {
                    left: l,
                    right: r,
                    top: t,
                    bottom: b,
                };
            }
        }
    }

    let side = |name: &str| get(&format!("{prefix}{name}{suffix}")).and_then(|v| parse(&v));
    if let Some(v) = side("Top") {
        rect.top = v;
    }
    if let Some(v) = side("Right") {
        rect.right = v;
    }
    if let Some(v) = side("Bottom") {
        rect.bottom = v;
    }
    if let Some(v) = side("Left") {
        rect.left = v;
    }
    rect
}

fn uniform<T: Copy>(value: T) -> Rect<T> {
    Rect {
        left: value,
        right: value,
        top: value,
        bottom: value,
    }
}

/// `flex` shorthand as grow, shrink and basis.
fn flex_shorthand(raw: &str, font_size: f32) -> Option<(f32, f32, Dimension)> {
    match raw {
        "none" => return Some((0.0, 0.0, Dimension::auto())),
        "auto" => return Some((1.0, 1.0, Dimension::auto())),
        "initial" => return Some((0.0, 1.0, Dimension::auto())),
        _ => {}
    }

    let mut factors = Vec::new();
    let mut basis = None;
    for part in raw.split_whitespace() {
        match part.parse::<f32>() {
            Ok(factor) if factors.len() < 2 && basis.is_none() => factors.push(factor.max(0.0)),
            _ => basis = Some(dimension(part, font_size)?),
        }
    }
    if factors.is_empty() && basis.is_none() {
        return None;
    }
    Some((
        factors.first().copied().unwrap_or(1.0),
        factors.get(1).copied().unwrap_or(1.0),
        basis.unwrap_or(Dimension::length(0.0)),
    ))
}

fn compute_layout(get: &impl Fn(&str) -> Option<String>, font_size: f32) -> Style {
    let dim = |key: &str| get(key).and_then(|v| dimension(&v, font_size));
    let lp = |v: &str| length_percentage(v, font_size);
    let lpa = |v: &str| length_percentage_auto(v, font_size);

    let mut layout: Style = Style::default();
    layout.display = match get("display").as_deref() {
        Some("none") => Display::None,
        _ => Display::Flex,
    };
    if get("position").as_deref() == Some("absolute") {
        layout.position = Position::Absolute;
    }
    layout.inset = Rect {
        left: get("left").and_then(|v| lpa(&v)).unwrap_or(LengthPercentageAuto::auto()),
        right: get("right").and_then(|v| lpa(&v)).unwrap_or(LengthPercentageAuto::auto()),
        top: get("top").and_then(|v| lpa(&v)).unwrap_or(LengthPercentageAuto::auto()),
        bottom: get("bottom").and_then(|v| lpa(&v)).unwrap_or(LengthPercentageAuto::auto()),
    };

    layout.flex_direction = match get("flexDirection").as_deref() {
        Some("column") => FlexDirection::Column,
        Some("column-reverse") => FlexDirection::ColumnReverse,
        Some("row-reverse") => FlexDirection::RowReverse,
        _ => FlexDirection::Row,
    };
    layout.flex_wrap = match get("flexWrap").as_deref() {
        Some("wrap") => FlexWrap::Wrap,
        Some("wrap-reverse") => FlexWrap::WrapReverse,
        _ => FlexWrap::NoWrap,
    };

    if let Some((grow, shrink, basis)) = get("flex").and_then(|v| flex_shorthand(&v, font_size)) {
        layout.flex_grow = grow;
        layout.flex_shrink = shrink;
        layout.flex_basis = basis;
    }
    if let Some(grow) = get("flexGrow").and_then(|v| v.parse::<f32>().ok()) {
        layout.flex_grow = grow.max(0.0);
    }
    if let Some(shrink) = get("flexShrink").and_then(|v| v.parse::<f32>().ok()) {
        layout.flex_shrink = shrink.max(0.0);
    }
    if let Some(basis) = dim("flexBasis") {
        layout.flex_basis = basis;
    }

    layout.size = Size {
        width: dim("width").unwrap_or(Dimension::auto()),
        height: dim("height").unwrap_or(Dimension::auto()),
    };
    layout.min_size = Size {
        width: dim("minWidth").unwrap_or(Dimension::auto()),
        height: dim("minHeight").unwrap_or(Dimension::auto()),
    };
    layout.max_size = Size {
        width: dim("maxWidth").unwrap_or(Dimension::auto()),
        height: dim("maxHeight").unwrap_or(Dimension::auto()),
    };

    let zero = LengthPercentage::length(0.0);
    layout.padding = edges(get, "padding", "", uniform(zero), lp);
    layout.margin = edges(get, "margin", "", uniform(LengthPercentageAuto::length(0.0)), lpa);

    let mut border = uniform(zero);
    if let Some(width) = get("border").and_then(|v| border_shorthand(&v, font_size).0) {
        border = uniform(LengthPercentage::length(width));
    }
    layout.border = edges(get, "border", "Width", border, lp);

    let gap = get("gap").and_then(|v| lp(&v)).unwrap_or(zero);
    layout.gap = Size {
        width: get("columnGap").and_then(|v| lp(&v)).unwrap_or(gap),
        height: get("rowGap").and_then(|v| lp(&v)).unwrap_or(gap),
    };

    layout.justify_content = get("justifyContent").and_then(|v| justify_content(&v));
    layout.align_items = get("alignItems").and_then(|v| align_items(&v));
    layout.align_self = get("alignSelf").and_then(|v| align_items(&v));
    layout.align_content = get("alignContent").and_then(|v| align_content(&v));

    layout
}

/// Width and color parts of a `border` shorthand.
fn border_shorthand(raw: &str, font_size: f32) -> (Option<f32>, Option<String>) {
    let mut width = None;
    let mut color = None;
    for part in raw.split_whitespace() {
        match parse_length(part, font_size) {
            Some(Length::Px(w)) => width = Some(w),
            _ if is_border_style(part) => {}
            _ => color = Some(part.to_string()),
        }
    }
    (width, color)
}

fn is_border_style(part: &str) -> bool {
    matches!(
        part,
        "solid" | "dashed" | "dotted" | "double" | "none" | "hidden" | "groove" | "ridge"
    )
}

/// Gradients and image backgrounds are not painted.
fn is_plain_color(value: &str) -> bool {
    !(value.contains("gradient(") || value.contains("url(") || value == "none")
}

/// Compute an element's layout style, decoration and the text style its
/// content inherits.
pub fn compute(style: Option<&StyleMap>, tag: &str, parent: &TextStyle) -> ComputedStyle {
    let empty = StyleMap::new();
    let style = style.unwrap_or(&empty);
    let get = |key: &str| style.get(key).and_then(value_str);

    let text = compute_text(&get, tag, parent);
    let layout = compute_layout(&get, text.font_size);

    let px = |key: &str| match get(key).and_then(|v| parse_length(&v, text.font_size)) {
        Some(Length::Px(px)) => Some(px),
        _ => None,
    };
    let decoration = Decoration {
        background: get("backgroundColor")
            .or_else(|| get("background"))
            .filter(|bg| is_plain_color(bg)),
        border_color: get("borderColor")
            .or_else(|| get("border").and_then(|v| border_shorthand(&v, text.font_size).1))
            .unwrap_or_else(|| text.color.clone()),
        border_radius: px("borderRadius").unwrap_or(0.0),
        opacity: get("opacity")
            .and_then(|v| v.parse::<f32>().ok())
            .map(|o| o.clamp(0.0, 1.0)),
    };

    ComputedStyle {
        layout,
        decoration,
        text,
    }
}
