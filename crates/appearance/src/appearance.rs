/// Process-wide setup shared by every tool built on these crates.
pub struct Appearance {
    app_name: String,
}

static LOGGER: std::sync::OnceLock<()> = std::sync::OnceLock::new();

fn init_logger() {
    LOGGER.get_or_init(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .filter_module("gltf", log::LevelFilter::Warn)
            .filter_module("tobj", log::LevelFilter::Warn)
            .parse_default_env()
            .init();
    });
}

impl Appearance {
    pub fn new(app_name: &str) -> Self {
        appearance_profiling::profile_function!();

        init_logger();
        log::debug!("{} started.", app_name);

        Self {
            app_name: app_name.to_owned(),
        }
    }

    /// Turns on puffin scope collection for the rest of the process.
    pub fn enable_profiling(&self) {
        appearance_profiling::set_enabled(true);
        log::info!("Profiling enabled for {}.", self.app_name);
    }
}
