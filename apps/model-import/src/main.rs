use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use appearance::appearance_asset_database::{AssetDatabase, FileAssetDatabase};
use appearance::appearance_model_import::{
    DefaultSceneIngest, ImportPipeline, ImportRequest, ImportSettings,
};
use appearance::appearance_texture::FileTextureResolver;
use appearance::Appearance;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Model file to import (.obj, .gltf or .glb)
    source: PathBuf,

    /// Root of the asset tree, asset paths are stored relative to it
    #[arg(long, default_value = "assets")]
    assets_root: PathBuf,

    /// Folder receiving the generated assets, defaults to `<assets-root>/models/<model name>`
    #[arg(long)]
    output: Option<PathBuf>,

    /// Do not fill missing albedo/normal slots from conventionally named textures
    #[arg(long, default_value_t = false)]
    no_auto_textures: bool,

    /// Collect puffin scopes while importing
    #[arg(long, default_value_t = false)]
    profile: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let appearance = Appearance::new("Model Import");
    if args.profile {
        appearance.enable_profiling();
    }

    anyhow::ensure!(
        DefaultSceneIngest::supports(&args.source),
        "{} cannot be imported by this tool, supported extensions are {:?}",
        args.source.display(),
        DefaultSceneIngest::SUPPORTED_EXTENSIONS
    );

    let output_dir = args.output.unwrap_or_else(|| {
        let name = args
            .source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Model".to_owned());
        args.assets_root.join("models").join(name)
    });

    let database: Arc<dyn AssetDatabase> = Arc::new(FileAssetDatabase::new(&args.assets_root));
    let settings = ImportSettings {
        auto_assign_textures: !args.no_auto_textures,
        ..Default::default()
    };
    let mut pipeline = ImportPipeline::new(
        Box::new(DefaultSceneIngest),
        Box::new(FileTextureResolver::new(database.clone())),
        database,
        settings,
    );

    let request = ImportRequest {
        source_path: args.source,
        output_dir,
    };
    let result = pipeline.import(&request);
    appearance::appearance_profiling::finish_frame();
    let mesh_guid = result?;

    if let Some(report) = pipeline.last_report() {
        log::info!(
            "{} material(s) written, {} skipped.",
            report.material_guids().count(),
            report.num_skipped_materials()
        );
        println!("{}", report.mesh_path.display());
    }
    println!("{}", mesh_guid);

    Ok(())
}
