use std::path::Path;

use anyhow::{Context, Result};

use super::{
    parse_float, FormatRecord, TransparencyDescriptor, TransparencyReport, PARSER_ALPHA_THRESHOLD,
};

/// `Tr` above this counts as transparent.
pub const MTL_TRANSPARENCY_THRESHOLD: f32 = 0.01;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MtlRecord {
    pub dissolve: Option<f32>,
    pub transparency: Option<f32>,
    pub opacity_map: Option<String>,
}

impl MtlRecord {
    pub fn is_transparent(&self) -> bool {
        self.dissolve
            .is_some_and(|dissolve| dissolve < PARSER_ALPHA_THRESHOLD)
            || self
                .transparency
                .is_some_and(|transparency| transparency > MTL_TRANSPARENCY_THRESHOLD)
            || self.opacity_map.is_some()
    }
}

/// Follows every `mtllib` of an OBJ file and reads `d`, `Tr` and `map_d` per material.
pub fn parse(path: &Path) -> TransparencyReport {
    appearance_profiling::profile_function!();

    let mut report = TransparencyReport::default();

    let mtl_paths = match material_libraries(path) {
        Ok(mtl_paths) => mtl_paths,
        Err(err) => {
            log::warn!("MTL transparency parse failed: {:#}", err);
            return report;
        }
    };

    for mtl_path in mtl_paths {
        match std::fs::read_to_string(&mtl_path) {
            Ok(mtl) => parse_mtl(&mtl, &mut report),
            Err(err) => log::warn!("Failed to read {}: {}", mtl_path.display(), err),
        }
    }

    report
}

fn material_libraries(path: &Path) -> Result<Vec<std::path::PathBuf>> {
    let obj = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let obj = String::from_utf8_lossy(&obj);
    let base_dir = path.parent().unwrap_or(Path::new(""));

    Ok(obj
        .lines()
        .filter_map(|line| line.trim().strip_prefix("mtllib"))
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(|rest| base_dir.join(rest.trim()))
        .collect())
}

pub fn parse_mtl(mtl: &str, report: &mut TransparencyReport) {
    let mut current: Option<(String, MtlRecord)> = None;

    for line in mtl.lines() {
        let line = line.trim();
        let Some((keyword, rest)) = line
            .split_once(char::is_whitespace)
            .map(|(keyword, rest)| (keyword, rest.trim()))
        else {
            continue;
        };

        if keyword == "newmtl" {
            if let Some((name, record)) = current.take() {
                report.insert(TransparencyDescriptor::new(&name, FormatRecord::Obj(record)));
            }
            current = Some((rest.to_owned(), MtlRecord::default()));
            continue;
        }

        let Some((_, record)) = &mut current else {
            continue;
        };
        match keyword {
            // `d -halo 0.5` is still a dissolve of 0.5.
            "d" => record.dissolve = rest.split_whitespace().last().and_then(parse_float),
            "Tr" => record.transparency = parse_float(rest),
            "map_d" => {
                record.opacity_map = rest.split_whitespace().last().map(str::to_owned)
            }
            _ => {}
        }
    }

    if let Some((name, record)) = current {
        report.insert(TransparencyDescriptor::new(&name, FormatRecord::Obj(record)));
    }
}
