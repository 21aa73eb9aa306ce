//! Request fonts: registration, family resolution and glyph metrics.

use std::collections::{HashMap, HashSet};

use super::css::TextStyle;
use super::text::{self, Segment};
use crate::models::FontDescriptor;

const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
];

/// Maps requested family names to the faces actually registered.
#[derive(Debug, Clone, Default)]
pub struct FontFamilies {
    aliases: HashMap<String, String>,
    fallback: Vec<String>,
}

impl FontFamilies {
    /// Register `family` under the caller-facing `name`. The first
    /// registered family becomes the default.
    pub fn alias(&mut self, name: &str, family: &str) {
        self.aliases.insert(name.to_lowercase(), family.to_string());
        if !self.fallback.iter().any(|f| f == family) {
            self.fallback.push(family.to_string());
        }
    }

    /// Family of the first registered font.
    pub fn primary(&self) -> Option<&str> {
        self.fallback.first().map(String::as_str)
    }

    /// Family names to try for a `fontFamily` style, in order. Registered
    /// families follow the requested ones and `sans-serif` closes the list.
    pub fn candidates(&self, requested: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = requested
            .unwrap_or_default()
            .split(',')
            .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\''))
            .filter(|name| !name.is_empty())
            .map(|name| {
                self.aliases
                    .get(&name.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| name.to_string())
            })
            .collect();
        for family in &self.fallback {
            if !names.contains(family) {
                names.push(family.clone());
            }
        }
        if !names.iter().any(|n| n == "sans-serif") {
            names.push("sans-serif".to_string());
        }
        names
    }

    /// `font-family` attribute value for a `fontFamily` style.
    pub fn resolve(&self, requested: Option<&str>) -> String {
        self.candidates(requested)
            .iter()
            .map(|name| {
                if GENERIC_FAMILIES.contains(&name.as_str()) {
                    name.clone()
                } else {
                    format!("'{}'", name.replace('\'', ""))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Load request fonts and map each descriptor name to the family the font
/// declares internally.
pub fn register_fonts(fontdb: &mut fontdb::Database, fonts: &[FontDescriptor]) -> FontFamilies {
    let mut families = FontFamilies::default();

    for font in fonts {
        let known: HashSet<fontdb::ID> = fontdb.faces().map(|face| face.id).collect();
        fontdb.load_font_data(font.data.clone());

        let family = fontdb
            .faces()
            .find(|face| !known.contains(&face.id))
            .and_then(|face| face.families.first())
            .map(|(name, _)| name.clone());
        match family {
            Some(family) => {
                tracing::debug!(name = %font.name, family = %family, weight = font.weight, "Registered font");
                families.alias(&font.name, &family);
            }
            None => tracing::warn!(name = %font.name, "Ignoring unparseable font data"),
        }
    }

    if let Some(primary) = families.primary() {
        fontdb.set_sans_serif_family(primary);
        fontdb.set_serif_family(primary);
    }
    families
}

fn query_family(name: &str) -> fontdb::Family<'_> {
    match name {
        "serif" => fontdb::Family::Serif,
        "sans-serif" | "system-ui" => fontdb::Family::SansSerif,
        "monospace" => fontdb::Family::Monospace,
        "cursive" => fontdb::Family::Cursive,
        "fantasy" => fontdb::Family::Fantasy,
        other => fontdb::Family::Name(other),
    }
}

/// Horizontal advances in em units, `None` where the face has no glyph.
fn glyph_advances(db: &fontdb::Database, id: fontdb::ID, chars: &[char]) -> Vec<Option<f32>> {
    db.with_face_data(id, |data, index| {
        let Ok(face) = ttf_parser::Face::parse(data, index) else {
            return vec![None; chars.len()];
        };
        let units_per_em = f32::from(face.units_per_em());
        chars
            .iter()
            .map(|c| {
                face.glyph_index(*c)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(|advance| f32::from(advance) / units_per_em)
            })
            .collect()
    })
    .unwrap_or_else(|| vec![None; chars.len()])
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FaceKey {
    family: Option<String>,
    weight: u16,
    italic: bool,
}

/// Text widths from the glyph tables of the registered faces.
///
/// Each character is measured with the face matching the run's style. A
/// character that face lacks is taken from the first other face that has
/// it, and falls back to an estimate when no face does. Emoji clusters are
/// drawn as images and measure one em.
pub struct FontMetrics<'a> {
    db: &'a fontdb::Database,
    families: &'a FontFamilies,
    faces: HashMap<FaceKey, Option<fontdb::ID>>,
    advances: HashMap<(Option<fontdb::ID>, char), Option<f32>>,
    fallback: HashMap<char, Option<f32>>,
}

impl<'a> FontMetrics<'a> {
    pub fn new(db: &'a fontdb::Database, families: &'a FontFamilies) -> Self {
        Self {
            db,
            families,
            faces: HashMap::new(),
            advances: HashMap::new(),
            fallback: HashMap::new(),
        }
    }

    /// Width of `text` in pixels.
    pub fn width(&mut self, content: &str, style: &TextStyle) -> f32 {
        let face = self.face(style);
        let mut ems = 0.0;
        for segment in text::segments(content) {
            match segment {
                Segment::Emoji(_) => ems += 1.0,
                Segment::Text(run) => {
                    self.prepare(face, run);
                    ems += run
                        .chars()
                        .map(|c| {
                            self.advances
                                .get(&(face, c))
                                .copied()
                                .flatten()
                                .unwrap_or_else(|| text::estimated_advance(c, style.font_weight))
                        })
                        .sum::<f32>();
                }
            }
        }
        ems * style.font_size
    }

    /// Best matching face for a text style.
    pub fn face(&mut self, style: &TextStyle) -> Option<fontdb::ID> {
        let key = FaceKey {
            family: style.font_family.clone(),
            weight: style.font_weight,
            italic: style.italic,
        };
        if let Some(id) = self.faces.get(&key) {
            return *id;
        }

        let names = self.families.candidates(style.font_family.as_deref());
        let families: Vec<fontdb::Family<'_>> = names.iter().map(|n| query_family(n)).collect();
        let id = self.db.query(&fontdb::Query {
            families: &families,
            weight: fontdb::Weight(style.font_weight),
            stretch: fontdb::Stretch::Normal,
            style: if style.italic {
                fontdb::Style::Italic
            } else {
                fontdb::Style::Normal
            },
        });
        self.faces.insert(key, id);
        id
    }

    /// Resolve and cache the advances of every new character in `run`.
    fn prepare(&mut self, face: Option<fontdb::ID>, run: &str) {
        let mut pending: Vec<char> = run
            .chars()
            .filter(|c| !self.advances.contains_key(&(face, *c)))
            .collect();
        pending.sort_unstable();
        pending.dedup();
        if pending.is_empty() {
            return;
        }

        let primary = match face {
            Some(id) => glyph_advances(self.db, id, &pending),
            None => vec![None; pending.len()],
        };
        let missing: Vec<char> = pending
            .iter()
            .zip(&primary)
            .filter(|(_, advance)| advance.is_none())
            .map(|(c, _)| *c)
            .collect();
        self.resolve_fallback(face, &missing);

        for (c, advance) in pending.into_iter().zip(primary) {
            let advance = advance.or_else(|| self.fallback.get(&c).copied().flatten());
            self.advances.insert((face, c), advance);
        }
    }

    /// Search the other faces for glyphs the primary face lacks. Each face
    /// is parsed once per batch.
    fn resolve_fallback(&mut self, skip: Option<fontdb::ID>, chars: &[char]) {
        let mut wanted: Vec<char> = chars
            .iter()
            .filter(|c| !self.fallback.contains_key(c))
            .copied()
            .collect();
        let db = self.db;

        for info in db.faces() {
            if wanted.is_empty() {
                break;
            }
            if Some(info.id) == skip {
                continue;
            }
            let found = glyph_advances(db, info.id, &wanted);
            for (c, advance) in wanted.iter().zip(found) {
                if advance.is_some() {
                    self.fallback.insert(*c, advance);
                }
            }
            wanted.retain(|c| !self.fallback.contains_key(c));
        }

        for c in wanted {
            self.fallback.insert(c, None);
        }
    }
}
