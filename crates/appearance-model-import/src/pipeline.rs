use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use appearance_asset_database::{
    asset_paths::{sanitize_file_name, unique_file_path},
    Asset, AssetDatabase, AssetMetadata, AssetType,
};
use appearance_model::{asset::MESH_ASSET_EXTENSION, MeshAsset, Scene};
use appearance_texture::{TextureExtractionRequest, TextureMap, TextureResolver};
use uuid::Uuid;

use crate::{
    error::ImportError,
    ingest::SceneIngest,
    material_extractor::{collect_material_infos, ExtractedMaterial, MaterialExtractor},
    mesh_converter::{convert_scene, CoordinateCorrection},
    settings::{extension_of, ImportSettings},
    transparency::strategy_for,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    /// No import has run yet.
    Idle,
    Loading,
    TextureExtraction,
    MaterialExtraction,
    MeshConversion,
    Saving,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub source_path: PathBuf,
    /// Folder receiving the copied source and every generated asset, created when missing.
    pub output_dir: PathBuf,
}

/// What the last successful import produced.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub mesh_guid: Uuid,
    pub mesh_path: PathBuf,
    pub source_copy: PathBuf,
    /// Index aligned with the source materials, `None` where extraction failed.
    pub materials: Vec<Option<ExtractedMaterial>>,
    pub textures: TextureMap,
}

impl ImportReport {
    pub fn material_guids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.materials.iter().flatten().map(|material| material.guid)
    }

    pub fn num_skipped_materials(&self) -> usize {
        self.materials.iter().filter(|material| material.is_none()).count()
    }
}

/// Turns one model file into a mesh asset plus material assets.
///
/// Runs every stage on the calling thread. A failed import leaves whatever was already written
/// on disk; importing again is safe since existing files are never overwritten.
pub struct ImportPipeline {
    ingest: Box<dyn SceneIngest>,
    textures: Box<dyn TextureResolver>,
    database: Arc<dyn AssetDatabase>,
    settings: ImportSettings,

    stage: ImportStage,
    last_report: Option<ImportReport>,
}

impl ImportPipeline {
    pub fn new(
        ingest: Box<dyn SceneIngest>,
        textures: Box<dyn TextureResolver>,
        database: Arc<dyn AssetDatabase>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            ingest,
            textures,
            database,
            settings,
            stage: ImportStage::Idle,
            last_report: None,
        }
    }

    pub fn stage(&self) -> ImportStage {
        self.stage
    }

    pub fn last_report(&self) -> Option<&ImportReport> {
        self.last_report.as_ref()
    }

    /// Imports `request.source_path` and returns the GUID of the saved mesh asset.
    pub fn import(&mut self, request: &ImportRequest) -> Result<Uuid, ImportError> {
        appearance_profiling::profile_function!();

        let timer = Instant::now();
        self.last_report = None;

        match self.run(request) {
            Ok(report) => {
                self.set_stage(ImportStage::Done);
                log::info!(
                    "Imported {} as {} in {:.2?}.",
                    request.source_path.display(),
                    report.mesh_guid,
                    timer.elapsed()
                );

                let mesh_guid = report.mesh_guid;
                self.last_report = Some(report);
                Ok(mesh_guid)
            }
            Err(err) => {
                self.set_stage(ImportStage::Failed);
                log::error!("Import of {} failed: {}", request.source_path.display(), err);
                Err(err)
            }
        }
    }

    fn set_stage(&mut self, stage: ImportStage) {
        log::info!("Import stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    fn run(&mut self, request: &ImportRequest) -> Result<ImportReport, ImportError> {
        let source_path = request.source_path.as_path();
        let output_dir = request.output_dir.as_path();
        let extension = extension_of(source_path);
        let model_name = model_name(source_path);

        self.set_stage(ImportStage::Loading);
        let scene = self.load(source_path, &extension)?;

        let strategy = strategy_for(source_path);
        let transparency = (strategy.parse)(source_path);
        log::debug!(
            "{} transparency parser found {} material(s).",
            strategy.name,
            transparency.materials.len()
        );
        let infos = collect_material_infos(&scene.materials, &model_name, &transparency);

        fs::create_dir_all(output_dir).map_err(|err| ImportError::io(output_dir, err))?;

        self.set_stage(ImportStage::TextureExtraction);
        let textures = {
            appearance_profiling::profile_scope!("Texture extraction");

            let texture_request = TextureExtractionRequest {
                source_path,
                output_dir,
                model_name: &model_name,
            };
            self.textures
                .extract(&texture_request, &scene, &infos)
                .map_err(ImportError::TextureExtraction)?
        };

        self.set_stage(ImportStage::MaterialExtraction);
        let materials = MaterialExtractor {
            database: self.database.as_ref(),
            textures: self.textures.as_ref(),
            strategy,
            report: &transparency,
            auto_assign: self.settings.auto_assign_textures,
        }
        .extract(output_dir, &infos, &textures);

        self.set_stage(ImportStage::MeshConversion);
        let mut mesh = convert_scene(
            &scene,
            &model_name,
            source_path,
            CoordinateCorrection::for_extension(&extension),
        )?;
        mesh.material_slots = materials
            .iter()
            .map(|material| material.as_ref().map(|material| material.guid))
            .collect();

        self.set_stage(ImportStage::Saving);
        let (source_copy, mesh_path) = self.save(&mut mesh, source_path, output_dir, &model_name)?;

        Ok(ImportReport {
            mesh_guid: mesh.uuid,
            mesh_path,
            source_copy,
            materials,
            textures,
        })
    }

    fn load(&self, source_path: &Path, extension: &str) -> Result<Scene, ImportError> {
        appearance_profiling::profile_function!();

        let metadata = fs::metadata(source_path)
            .ok()
            .filter(|metadata| metadata.is_file())
            .ok_or_else(|| ImportError::MissingSource(source_path.to_path_buf()))?;
        if metadata.len() == 0 {
            return Err(ImportError::EmptySource(source_path.to_path_buf()));
        }

        let post_process = self.settings.post_process.for_extension(extension);
        let scene = self
            .ingest
            .ingest(source_path, post_process)
            .map_err(|source| ImportError::Ingest {
                path: source_path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| ImportError::EmptyScene(source_path.to_path_buf()))?;

        if !scene.has_meshes() {
            return Err(ImportError::NoMeshes(source_path.to_path_buf()));
        }

        log::info!(
            "Loaded {}: {} node(s), {} mesh(es), {} material(s).",
            source_path.display(),
            scene.nodes.len(),
            scene.meshes.len(),
            scene.materials.len()
        );
        Ok(scene)
    }

    fn save(
        &self,
        mesh: &mut MeshAsset,
        source_path: &Path,
        output_dir: &Path,
        model_name: &str,
    ) -> Result<(PathBuf, PathBuf), ImportError> {
        appearance_profiling::profile_function!();

        mesh.uuid = Uuid::new_v4();

        let source_copy = match source_path.file_name() {
            Some(file_name) => output_dir.join(file_name),
            None => return Err(ImportError::MissingSource(source_path.to_path_buf())),
        };
        if !source_copy.exists() {
            fs::copy(source_path, &source_copy).map_err(|err| ImportError::io(&source_copy, err))?;
            self.database
                .write_metadata(
                    &source_copy,
                    AssetMetadata::new(Uuid::new_v4(), AssetType::from_model_path(source_path)),
                )
                .map_err(ImportError::Database)?;
            log::info!("Copied source to {}.", source_copy.display());
        } else {
            log::debug!("{} already present, keeping it.", source_copy.display());
        }
        mesh.source_path = self.database.relative_path(&source_copy);

        let mesh_path = unique_file_path(output_dir, model_name, MESH_ASSET_EXTENSION);
        let data = mesh.save().map_err(ImportError::Serialize)?;
        self.database
            .write_asset(
                &mesh_path,
                &data,
                AssetMetadata::new(mesh.uuid, AssetType::MeshAsset),
            )
            .map_err(ImportError::Database)?;
        log::info!("Saved mesh asset {}.", mesh_path.display());

        Ok((source_copy, mesh_path))
    }
}

fn model_name(source_path: &Path) -> String {
    let name = source_path
        .file_stem()
        .map(|stem| sanitize_file_name(&stem.to_string_lossy()))
        .unwrap_or_default();
    if name.is_empty() {
        "Model".to_owned()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_come_from_the_file_stem() {
        assert_eq!(model_name(Path::new("assets/Old Chair.fbx")), "Old Chair");
        assert_eq!(model_name(Path::new("a/b|c.obj")), "b_c");
        assert_eq!(model_name(Path::new("a/...")), "Model");
    }

    #[test]
    fn report_counts_skipped_materials() {
        let report = ImportReport {
            mesh_guid: Uuid::new_v4(),
            mesh_path: PathBuf::from("m.meshasset"),
            source_copy: PathBuf::from("m.obj"),
            materials: vec![
                Some(ExtractedMaterial {
                    guid: Uuid::new_v4(),
                    path: PathBuf::from("A.material"),
                }),
                None,
            ],
            textures: TextureMap::new(),
        };
        assert_eq!(report.material_guids().count(), 1);
        assert_eq!(report.num_skipped_materials(), 1);
    }
}
