//! Format-native transparency parsers.
//!
//! Generic ingest flattens each format's notion of transparency into a single opacity value,
//! which loses information. Each parser here re-reads the source file and reports what the
//! format itself says about every material. Parsers never fail: they log and return whatever
//! they managed to read, possibly nothing.

use std::{collections::HashMap, path::Path};

use glam::Vec4;

use crate::settings::extension_of;

pub mod dae;
pub mod fbx;
pub mod gltf;
pub mod obj;

pub use dae::DaeRecord;
pub use fbx::FbxRecord;
pub use gltf::GltfRecord;
pub use obj::MtlRecord;

/// Alpha below this counts as transparent for every format parser.
pub const PARSER_ALPHA_THRESHOLD: f32 = 0.99;

/// Raw transparency fields as written by one format.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatRecord {
    Gltf(GltfRecord),
    Fbx(FbxRecord),
    Obj(MtlRecord),
    Dae(DaeRecord),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransparencyDescriptor {
    pub material_name: String,
    pub record: FormatRecord,
}

impl TransparencyDescriptor {
    pub fn new(material_name: &str, record: FormatRecord) -> Self {
        Self {
            material_name: material_name.to_owned(),
            record,
        }
    }

    pub fn is_transparent(&self) -> bool {
        match &self.record {
            FormatRecord::Gltf(record) => record.is_transparent(),
            FormatRecord::Fbx(record) => record.is_transparent(),
            FormatRecord::Obj(record) => record.is_transparent(),
            FormatRecord::Dae(record) => record.is_transparent(),
        }
    }

    /// glTF base color, authoritative over whatever generic ingest reported.
    pub fn base_color_factor(&self) -> Option<Vec4> {
        match &self.record {
            FormatRecord::Gltf(record) => Some(Vec4::from(record.base_color_factor)),
            _ => None,
        }
    }
}

/// Everything one parser learned about a model file.
#[derive(Debug, Clone, Default)]
pub struct TransparencyReport {
    pub materials: HashMap<String, TransparencyDescriptor>,
    /// glTF texture index to image uri.
    pub texture_paths: HashMap<usize, String>,
}

impl TransparencyReport {
    /// Tries each candidate name in order.
    pub fn descriptor<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Option<&TransparencyDescriptor> {
        names
            .into_iter()
            .find_map(|name| self.materials.get(name))
    }

    pub fn texture_path(&self, texture_index: usize) -> Option<&str> {
        self.texture_paths.get(&texture_index).map(String::as_str)
    }

    pub(crate) fn insert(&mut self, descriptor: TransparencyDescriptor) {
        self.materials
            .insert(descriptor.material_name.clone(), descriptor);
    }
}

/// One row of the parser table.
pub struct FormatStrategy {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub parse: fn(&Path) -> TransparencyReport,
    /// Last-resort guess from the material name, for formats whose parser often has nothing to say.
    pub name_heuristic: Option<fn(&str) -> bool>,
}

impl FormatStrategy {
    pub fn matches_name(&self, material_name: &str) -> bool {
        self.name_heuristic
            .is_some_and(|heuristic| heuristic(material_name))
    }
}

pub const STRATEGIES: &[FormatStrategy] = &[
    FormatStrategy {
        name: "gltf",
        extensions: &["gltf", "glb"],
        parse: gltf::parse,
        name_heuristic: None,
    },
    FormatStrategy {
        name: "fbx",
        extensions: &["fbx"],
        parse: fbx::parse,
        name_heuristic: Some(fbx::name_suggests_transparency),
    },
    FormatStrategy {
        name: "obj",
        extensions: &["obj"],
        parse: obj::parse,
        name_heuristic: None,
    },
    FormatStrategy {
        name: "dae",
        extensions: &["dae"],
        parse: dae::parse,
        name_heuristic: None,
    },
];

/// Formats without a parser rely on the generic opacity checks alone.
pub const GENERIC_STRATEGY: FormatStrategy = FormatStrategy {
    name: "generic",
    extensions: &[],
    parse: parse_nothing,
    name_heuristic: None,
};

fn parse_nothing(_path: &Path) -> TransparencyReport {
    TransparencyReport::default()
}

pub fn strategy_for(path: &Path) -> &'static FormatStrategy {
    let extension = extension_of(path);
    STRATEGIES
        .iter()
        .find(|strategy| strategy.extensions.contains(&extension.as_str()))
        .unwrap_or(&GENERIC_STRATEGY)
}

/// Leading bytes of `path`, used to detect binary variants we do not parse.
pub(crate) fn starts_with(path: &Path, magic: &[u8]) -> bool {
    use std::io::Read;

    let mut header = vec![0; magic.len()];
    std::fs::File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .is_ok_and(|_| header == magic)
}

/// Trims and parses a float the same way regardless of locale.
pub(crate) fn parse_float(token: &str) -> Option<f32> {
    token.trim().parse::<f32>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_lookup_ignores_case() {
        assert_eq!(strategy_for(Path::new("a/Model.FBX")).name, "fbx");
        assert_eq!(strategy_for(Path::new("duck.glb")).name, "gltf");
        assert_eq!(strategy_for(Path::new("scene.dae")).name, "dae");
        assert_eq!(strategy_for(Path::new("mesh.3ds")).name, "generic");
        assert_eq!(strategy_for(Path::new("no_extension")).name, "generic");
    }

    #[test]
    fn only_fbx_guesses_from_names() {
        assert!(strategy_for(Path::new("a.fbx")).matches_name("WindowGlass_01"));
        assert!(!strategy_for(Path::new("a.obj")).matches_name("WindowGlass_01"));
        assert!(!GENERIC_STRATEGY.matches_name("Glass"));
    }

    #[test]
    fn descriptor_lookup_tries_names_in_order() {
        let mut report = TransparencyReport::default();
        report.insert(TransparencyDescriptor::new(
            "Glass_Clean",
            FormatRecord::Obj(MtlRecord {
                dissolve: Some(0.5),
                ..Default::default()
            }),
        ));

        assert!(report.descriptor(["Glass:Clean", "Glass_Clean"]).is_some());
        assert!(report.descriptor(["Other"]).is_none());
    }

    #[test]
    fn missing_files_have_no_magic() {
        assert!(!starts_with(Path::new("/definitely/not/here.glb"), b"glTF"));
    }

    #[test]
    fn floats_are_locale_independent() {
        assert_eq!(parse_float(" 0.25 "), Some(0.25));
        assert_eq!(parse_float("0,25"), None);
        assert_eq!(parse_float("NaN"), None);
    }
}
