use std::path::Path;

use super::{
    parse_float, starts_with, FormatRecord, TransparencyDescriptor, TransparencyReport,
    PARSER_ALPHA_THRESHOLD,
};

const BINARY_MAGIC: &[u8] = b"Kaydara FBX Binary";

const TRANSPARENT_NAME_KEYWORDS: &[&str] = &[
    "glass",
    "window",
    "transparent",
    "alpha",
    "opacity",
    "water",
    "ice",
    "crystal",
];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FbxRecord {
    pub opacity: Option<f32>,
    pub transparency_factor: Option<f32>,
    pub has_transparent_color: bool,
}

impl FbxRecord {
    pub fn is_transparent(&self) -> bool {
        self.has_transparent_color
            || self.transparency_factor.is_some_and(|factor| factor > 0.0)
            || self
                .opacity
                .is_some_and(|opacity| opacity < PARSER_ALPHA_THRESHOLD)
    }
}

pub fn name_suggests_transparency(material_name: &str) -> bool {
    let name = material_name.to_lowercase();
    TRANSPARENT_NAME_KEYWORDS
        .iter()
        .any(|keyword| name.contains(keyword))
}

/// Line scans ASCII FBX for material transparency properties. Binary FBX yields nothing.
pub fn parse(path: &Path) -> TransparencyReport {
    appearance_profiling::profile_function!();

    if starts_with(path, BINARY_MAGIC) {
        log::debug!(
            "{} is binary FBX, falling back to name heuristics.",
            path.display()
        );
        return TransparencyReport::default();
    }

    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(err) => {
            log::warn!("Failed to read {}: {}", path.display(), err);
            return TransparencyReport::default();
        }
    };

    scan_lines(String::from_utf8_lossy(&contents).lines())
}

struct OpenMaterial {
    name: String,
    record: FbxRecord,
    depth: i32,
    entered: bool,
}

#[derive(Default)]
struct Scan {
    report: TransparencyReport,
    current: Option<OpenMaterial>,
    depth: i32,
}

impl Scan {
    fn close_material(mut self) -> Self {
        if let Some(material) = self.current.take() {
            self.report.insert(TransparencyDescriptor::new(
                &material.name,
                FormatRecord::Fbx(material.record),
            ));
        }
        self
    }

    fn step(mut self, line: &str) -> Self {
        let line = line.trim();

        if line.starts_with("Material:") {
            self = self.close_material();
            self.current = quoted_name(line).map(|name| OpenMaterial {
                name: name.strip_prefix("Material::").unwrap_or(name).to_owned(),
                record: FbxRecord::default(),
                depth: self.depth,
                entered: false,
            });
        } else if let Some(material) = &mut self.current {
            read_property(line, &mut material.record);
        }

        let opened = line.matches('{').count() as i32;
        let closed = line.matches('}').count() as i32;
        self.depth += opened - closed;

        let left = match &mut self.current {
            Some(material) => {
                material.entered |= self.depth > material.depth;
                material.entered && self.depth <= material.depth
            }
            None => false,
        };
        if left {
            self = self.close_material();
        }

        self
    }
}

/// Folds the file line by line, carrying the open material as the only state.
pub fn scan_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> TransparencyReport {
    lines
        .into_iter()
        .fold(Scan::default(), Scan::step)
        .close_material()
        .report
}

fn quoted_name(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let len = line[start..].find('"')?;
    Some(&line[start..start + len])
}

fn read_property(line: &str, record: &mut FbxRecord) {
    let Some(property) = line.strip_prefix("P:") else {
        return;
    };
    let Some(property_name) = quoted_name(property) else {
        return;
    };

    match property_name {
        "TransparentColor" => record.has_transparent_color = true,
        "TransparencyFactor" => record.transparency_factor = fifth_token(property),
        "Opacity" => record.opacity = fifth_token(property),
        _ => {}
    }
}

fn fifth_token(property: &str) -> Option<f32> {
    property.split(',').nth(4).and_then(parse_float)
}
