use std::path::{Path, PathBuf};

use anyhow::Result;
use appearance_asset_database::{
    asset_paths::{sanitize_file_name, unique_file_path},
    Asset, AssetDatabase, AssetMetadata, AssetType,
};
use appearance_model::{
    asset::MATERIAL_ASSET_EXTENSION,
    material::{AlphaMode, SceneMaterial},
    MaterialAsset, MaterialInfo, TextureChannel, TransparencyMode,
};
use appearance_texture::{lookup_texture, TextureMap, TextureResolver};
use uuid::Uuid;

use crate::transparency::{FormatRecord, FormatStrategy, TransparencyDescriptor, TransparencyReport};

/// Opacity below this makes a material transparent when no format parser knows better.
pub const GENERIC_OPACITY_THRESHOLD: f32 = 0.95;

/// Names ingest uses when a material has none of its own.
const SENTINEL_NAMES: &[&str] = &["", "DefaultMaterial"];

/// Builds the generic material records, one per source material and in the same order.
pub fn collect_material_infos(
    materials: &[SceneMaterial],
    model_name: &str,
    report: &TransparencyReport,
) -> Vec<MaterialInfo> {
    appearance_profiling::profile_function!();

    materials
        .iter()
        .enumerate()
        .map(|(index, material)| {
            let sanitized = sanitize_file_name(&material.name);
            let name = if SENTINEL_NAMES.contains(&sanitized.as_str()) {
                format!("{}_Mat{}", model_name, index)
            } else {
                sanitized
            };

            let mut info = MaterialInfo {
                source_index: index,
                source_name: material.name.clone(),
                name,
                albedo: material.color,
                metallic: material.metallic,
                roughness: material.roughness,
                opacity: material.opacity,
                alpha_mode: material.alpha_mode,
                emission: material.emission.max_element(),
                textures: material.textures.clone(),
            };

            if let Some(descriptor) = report.descriptor([info.source_name.as_str(), info.name.as_str()])
            {
                apply_gltf_descriptor(&mut info, descriptor, report);
            }
            info
        })
        .collect()
}

/// glTF JSON is authoritative for base color and fills texture slots ingest left empty.
fn apply_gltf_descriptor(
    info: &mut MaterialInfo,
    descriptor: &TransparencyDescriptor,
    report: &TransparencyReport,
) {
    let FormatRecord::Gltf(record) = &descriptor.record else {
        return;
    };

    if let Some(base_color) = descriptor.base_color_factor() {
        info.albedo = base_color;
        info.opacity = base_color.w;
    }

    let slots = [
        (TextureChannel::Albedo, record.textures.base_color),
        (TextureChannel::MetallicRoughness, record.textures.metallic_roughness),
        (TextureChannel::Normal, record.textures.normal),
        (TextureChannel::Occlusion, record.textures.occlusion),
        (TextureChannel::Emissive, record.textures.emissive),
    ];
    for (channel, texture_index) in slots {
        if let Some(path) = texture_index.and_then(|index| report.texture_path(index)) {
            if info.textures.fill(channel, path) {
                log::debug!("Filled {:?} of {} with {}.", channel, info.name, path);
            }
        }
    }
}

pub struct CascadeInput<'a> {
    pub info: &'a MaterialInfo,
    pub descriptor: Option<&'a TransparencyDescriptor>,
    pub strategy: &'a FormatStrategy,
}

pub struct CascadeRule {
    pub name: &'static str,
    pub applies: fn(&CascadeInput) -> bool,
    pub verdict: fn(&CascadeInput) -> TransparencyMode,
}

fn blend_if(transparent: bool) -> TransparencyMode {
    if transparent {
        TransparencyMode::Blend
    } else {
        TransparencyMode::Opaque
    }
}

/// Evaluated in order, the first rule that applies decides.
pub const TRANSPARENCY_CASCADE: &[CascadeRule] = &[
    CascadeRule {
        name: "format descriptor",
        applies: |input| input.descriptor.is_some(),
        verdict: |input| blend_if(input.descriptor.is_some_and(TransparencyDescriptor::is_transparent)),
    },
    CascadeRule {
        name: "name heuristic",
        applies: |input| input.strategy.matches_name(&input.info.source_name),
        verdict: |_| TransparencyMode::Blend,
    },
    CascadeRule {
        name: "generic opacity",
        applies: |_| true,
        verdict: |input| {
            let info = input.info;
            // A texture with an alpha channel alone is never enough, cutout masks have one too.
            blend_if(
                info.alpha_mode == AlphaMode::Blend
                    || info.opacity < GENERIC_OPACITY_THRESHOLD
                    || info.textures.opacity.is_some(),
            )
        },
    },
];

pub fn resolve_transparency(input: &CascadeInput) -> (TransparencyMode, &'static str) {
    TRANSPARENCY_CASCADE
        .iter()
        .find(|rule| (rule.applies)(input))
        .map(|rule| ((rule.verdict)(input), rule.name))
        .unwrap_or((TransparencyMode::Opaque, "none"))
}

/// Turns a generic material record into an asset with resolved textures.
pub fn build_material(
    info: &MaterialInfo,
    report: &TransparencyReport,
    strategy: &FormatStrategy,
    textures: &TextureMap,
) -> MaterialAsset {
    let descriptor = report.descriptor([info.source_name.as_str(), info.name.as_str()]);
    let (transparency_mode, rule) = resolve_transparency(&CascadeInput {
        info,
        descriptor,
        strategy,
    });
    log::debug!(
        "Material {} is {:?} (decided by {}).",
        info.name,
        transparency_mode,
        rule
    );

    let mut material = MaterialAsset {
        albedo_color: info.albedo,
        metallic: info.metallic,
        roughness: info.roughness,
        opacity: info.opacity,
        transparency_mode,
        emission: info.emission,
        ..MaterialAsset::new(&info.name)
    };

    for (channel, path) in info.textures.iter() {
        match lookup_texture(textures, path) {
            Some(guid) => {
                material.textures.set(channel, guid);
                if channel == TextureChannel::Emissive {
                    material.emission = 1.0;
                }
            }
            None => log::debug!("Texture {} of {} was not resolved.", path, info.name),
        }
    }

    material
}

/// Fills missing albedo/normal slots from naming conventions. Transparent materials without any
/// texture are left alone, they are most likely meant to be plain glass.
fn auto_assign_textures(material: &mut MaterialAsset, textures: &dyn TextureResolver) {
    if material.textures.albedo.is_some() && material.textures.normal.is_some() {
        return;
    }
    if material.is_transparent() && material.textures.num_assigned() == 0 {
        log::debug!("Skipping texture auto-assignment for untextured transparent {}.", material.name);
        return;
    }

    let assigned = textures.auto_assign(&material.name);
    if material.textures.albedo.is_none() {
        if let Some(albedo) = assigned.albedo {
            material.textures.set(TextureChannel::Albedo, albedo);
        }
    }
    if material.textures.normal.is_none() {
        if let Some(normal) = assigned.normal {
            material.textures.set(TextureChannel::Normal, normal);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMaterial {
    pub guid: Uuid,
    pub path: PathBuf,
}

pub struct MaterialExtractor<'a> {
    pub database: &'a dyn AssetDatabase,
    pub textures: &'a dyn TextureResolver,
    pub strategy: &'a FormatStrategy,
    pub report: &'a TransparencyReport,
    pub auto_assign: bool,
}

impl MaterialExtractor<'_> {
    /// Persists one material asset per record. Failures are logged and leave a `None` in place.
    pub fn extract(
        &self,
        output_dir: &Path,
        infos: &[MaterialInfo],
        texture_map: &TextureMap,
    ) -> Vec<Option<ExtractedMaterial>> {
        appearance_profiling::profile_function!();

        infos
            .iter()
            .map(|info| match self.extract_one(output_dir, info, texture_map) {
                Ok(extracted) => Some(extracted),
                Err(err) => {
                    log::warn!("Skipping material {}: {:#}", info.name, err);
                    None
                }
            })
            .collect()
    }

    fn extract_one(
        &self,
        output_dir: &Path,
        info: &MaterialInfo,
        texture_map: &TextureMap,
    ) -> Result<ExtractedMaterial> {
        let mut material = build_material(info, self.report, self.strategy, texture_map);
        if self.auto_assign {
            auto_assign_textures(&mut material, self.textures);
        }

        material.uuid = Uuid::new_v4();
        let path = unique_file_path(output_dir, &info.name, MATERIAL_ASSET_EXTENSION);
        self.database.write_asset(
            &path,
            &material.save()?,
            AssetMetadata::new(material.uuid, AssetType::Material),
        )?;

        log::info!(
            "Saved material {} ({:?}, {} texture(s)).",
            path.display(),
            material.transparency_mode,
            material.textures.num_assigned()
        );
        Ok(ExtractedMaterial {
            guid: material.uuid,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use appearance_model::material::MaterialTexturePaths;
    use appearance_texture::{AutoAssignedTextures, TextureExtractionRequest};
    use glam::Vec4;

    use super::*;
    use crate::transparency::{
        strategy_for, FbxRecord, GltfRecord, MtlRecord, GENERIC_STRATEGY,
    };

    fn scene_material(name: &str) -> SceneMaterial {
        SceneMaterial {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    fn report_with(name: &str, record: FormatRecord) -> TransparencyReport {
        let mut report = TransparencyReport::default();
        report.insert(TransparencyDescriptor::new(name, record));
        report
    }

    struct FixedResolver(AutoAssignedTextures);

    impl TextureResolver for FixedResolver {
        fn extract(
            &mut self,
            _request: &TextureExtractionRequest,
            _scene: &appearance_model::Scene,
            _materials: &[MaterialInfo],
        ) -> Result<TextureMap> {
            Ok(TextureMap::new())
        }

        fn auto_assign(&self, _material_name: &str) -> AutoAssignedTextures {
            self.0
        }
    }

    #[test]
    fn names_are_synthesised_or_sanitised() {
        let infos = collect_material_infos(
            &[scene_material(""), scene_material("DefaultMaterial"), scene_material("Metal:Rusty")],
            "crate",
            &TransparencyReport::default(),
        );

        assert_eq!(infos[0].name, "crate_Mat0");
        assert_eq!(infos[1].name, "crate_Mat1");
        assert_eq!(infos[2].name, "Metal_Rusty");
        assert_eq!(infos[2].source_name, "Metal:Rusty");
    }

    #[test]
    fn gltf_base_color_overrides_ingest() {
        let mut material = scene_material("Glass");
        material.color = Vec4::new(0.2, 0.2, 0.2, 1.0);
        let mut report = report_with(
            "Glass",
            FormatRecord::Gltf(GltfRecord {
                base_color_factor: [1.0, 1.0, 1.0, 0.4],
                textures: crate::transparency::gltf::GltfTextureIndices {
                    base_color: Some(0),
                    ..Default::default()
                },
                ..Default::default()
            }),
        );
        report.texture_paths.insert(0, "glass.png".to_owned());

        let infos = collect_material_infos(&[material], "window", &report);
        assert_eq!(infos[0].albedo, Vec4::new(1.0, 1.0, 1.0, 0.4));
        assert_eq!(infos[0].opacity, 0.4);
        assert_eq!(infos[0].textures.albedo.as_deref(), Some("glass.png"));
    }

    #[test]
    fn gap_fill_never_overwrites() {
        let mut material = scene_material("Wood");
        material.textures.albedo = Some("wood_ingest.png".to_owned());
        let mut report = report_with(
            "Wood",
            FormatRecord::Gltf(GltfRecord {
                textures: crate::transparency::gltf::GltfTextureIndices {
                    base_color: Some(0),
                    normal: Some(1),
                    ..Default::default()
                },
                ..Default::default()
            }),
        );
        report.texture_paths.insert(0, "wood_json.png".to_owned());
        report.texture_paths.insert(1, "wood_normal.png".to_owned());

        let infos = collect_material_infos(&[material], "table", &report);
        assert_eq!(infos[0].textures.albedo.as_deref(), Some("wood_ingest.png"));
        assert_eq!(infos[0].textures.normal.as_deref(), Some("wood_normal.png"));
    }

    #[test]
    fn descriptor_verdict_is_final() {
        let infos = collect_material_infos(&[scene_material("Glass")], "m", &TransparencyReport::default());

        // Parser says transparent even though ingest reports full opacity.
        let report = report_with(
            "Glass",
            FormatRecord::Obj(MtlRecord {
                dissolve: Some(0.3),
                ..Default::default()
            }),
        );
        let material = build_material(&infos[0], &report, strategy_for(Path::new("a.obj")), &TextureMap::new());
        assert_eq!(material.transparency_mode, TransparencyMode::Blend);

        // Parser says opaque, so a name that looks like glass does not matter.
        let report = report_with("Glass", FormatRecord::Fbx(FbxRecord::default()));
        let material = build_material(&infos[0], &report, strategy_for(Path::new("a.fbx")), &TextureMap::new());
        assert_eq!(material.transparency_mode, TransparencyMode::Opaque);
    }

    #[test]
    fn name_heuristic_only_for_fbx() {
        let infos = collect_material_infos(
            &[scene_material("WindowGlass_01")],
            "house",
            &TransparencyReport::default(),
        );
        let report = TransparencyReport::default();

        let fbx = build_material(&infos[0], &report, strategy_for(Path::new("house.fbx")), &TextureMap::new());
        assert_eq!(fbx.transparency_mode, TransparencyMode::Blend);

        let obj = build_material(&infos[0], &report, strategy_for(Path::new("house.obj")), &TextureMap::new());
        assert_eq!(obj.transparency_mode, TransparencyMode::Opaque);
    }

    #[test]
    fn generic_fallback() {
        let report = TransparencyReport::default();
        let mut info = collect_material_infos(&[scene_material("Leaves")], "tree", &report).remove(0);

        let opaque = build_material(&info, &report, &GENERIC_STRATEGY, &TextureMap::new());
        assert_eq!(opaque.transparency_mode, TransparencyMode::Opaque);

        info.opacity = 0.9;
        let faded = build_material(&info, &report, &GENERIC_STRATEGY, &TextureMap::new());
        assert_eq!(faded.transparency_mode, TransparencyMode::Blend);

        info.opacity = 1.0;
        info.textures.opacity = Some("leaves_alpha.png".to_owned());
        let cutout = build_material(&info, &report, &GENERIC_STRATEGY, &TextureMap::new());
        assert_eq!(cutout.transparency_mode, TransparencyMode::Blend);

        info.textures.opacity = None;
        info.alpha_mode = AlphaMode::Blend;
        let blended = build_material(&info, &report, &GENERIC_STRATEGY, &TextureMap::new());
        assert_eq!(blended.transparency_mode, TransparencyMode::Blend);
    }

    #[test]
    fn textures_resolve_by_path_then_file_name() {
        let albedo = Uuid::new_v4();
        let emissive = Uuid::new_v4();
        let mut texture_map = TextureMap::new();
        texture_map.insert("maps/lamp_albedo.png".to_owned(), albedo);
        texture_map.insert("C:\\export\\lamp_emissive.png".to_owned(), emissive);

        let mut info =
            collect_material_infos(&[scene_material("Lamp")], "lamp", &TransparencyReport::default()).remove(0);
        info.textures = MaterialTexturePaths {
            albedo: Some("maps/lamp_albedo.png".to_owned()),
            emissive: Some("lamp_emissive.png".to_owned()),
            normal: Some("missing.png".to_owned()),
            ..Default::default()
        };

        let material = build_material(&info, &TransparencyReport::default(), &GENERIC_STRATEGY, &texture_map);
        assert_eq!(material.textures.albedo, Some(albedo));
        assert_eq!(material.textures.emissive, Some(emissive));
        assert_eq!(material.textures.normal, None);
        assert_eq!(material.emission, 1.0);
    }

    #[test]
    fn emission_follows_ingest_until_a_texture_is_assigned() {
        let mut material = scene_material("Neon");
        material.emission = glam::Vec3::new(0.5, 4.0, 0.0);
        let mut info = collect_material_infos(&[material], "sign", &TransparencyReport::default()).remove(0);
        assert_eq!(info.emission, 4.0);

        let plain = build_material(&info, &TransparencyReport::default(), &GENERIC_STRATEGY, &TextureMap::new());
        assert_eq!(plain.emission, 4.0);

        let emissive = Uuid::new_v4();
        let mut texture_map = TextureMap::new();
        texture_map.insert("neon_emissive.png".to_owned(), emissive);
        info.textures.emissive = Some("neon_emissive.png".to_owned());
        let textured = build_material(&info, &TransparencyReport::default(), &GENERIC_STRATEGY, &texture_map);
        assert_eq!(textured.textures.emissive, Some(emissive));
        assert_eq!(textured.emission, 1.0);
    }

    #[test]
    fn auto_assignment_rules() {
        let albedo = Uuid::new_v4();
        let normal = Uuid::new_v4();
        let resolver = FixedResolver(AutoAssignedTextures {
            albedo: Some(albedo),
            normal: Some(normal),
        });

        let mut glass = MaterialAsset {
            transparency_mode: TransparencyMode::Blend,
            ..MaterialAsset::new("Glass")
        };
        auto_assign_textures(&mut glass, &resolver);
        assert_eq!(glass.textures.num_assigned(), 0);

        let resolved_albedo = Uuid::new_v4();
        let mut brick = MaterialAsset::new("Brick");
        brick.textures.set(TextureChannel::Albedo, resolved_albedo);
        auto_assign_textures(&mut brick, &resolver);
        assert_eq!(brick.textures.albedo, Some(resolved_albedo));
        assert_eq!(brick.textures.normal, Some(normal));
    }

    #[test]
    fn failed_materials_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let database = appearance_asset_database::FileAssetDatabase::new(dir.path());
        let resolver = FixedResolver(AutoAssignedTextures::default());
        let report = TransparencyReport::default();
        let extractor = MaterialExtractor {
            database: &database,
            textures: &resolver,
            strategy: &GENERIC_STRATEGY,
            report: &report,
            auto_assign: true,
        };

        let infos = collect_material_infos(
            &[scene_material("Good"), scene_material("Bad")],
            "model",
            &report,
        );
        // The second material points into a folder that does not exist.
        let mut extracted = extractor.extract(dir.path(), &infos[..1], &TextureMap::new());
        extracted.extend(extractor.extract(&dir.path().join("missing"), &infos[1..], &TextureMap::new()));

        assert!(extracted[0].is_some());
        assert!(extracted[1].is_none());
        assert!(dir.path().join("Good.material").exists());
        assert!(dir.path().join("Good.material.meta").exists());
    }
}
