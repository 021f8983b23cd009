use std::path::{Path, PathBuf};

use assembly_baker_core::{
    bake, build_scene, AngleSampling, ArtifactSettings, ArtifactWriter, Assembly, BakeArtifacts,
    BakeConfig, CachedProvider, ContentProvider, Credentials, DocumentRef, OnshapeClient,
    PartEdges, PartTessellation,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> assembly_baker_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bake(args) => run_bake(args),
        Commands::Scene {
            faces,
            edges,
            assembly,
            out,
        } => run_scene(&faces, &edges, &assembly, out),
    }
}

fn run_bake(args: BakeArgs) -> assembly_baker_core::Result<()> {
    let config = args.to_config()?;
    tracing::info!(document = ?config.document, "starting bake");

    let credentials = Credentials::load(&args.secrets)?;
    let client = OnshapeClient::new(config.document.clone(), &credentials);
    let provider: Box<dyn ContentProvider> = match &config.cache_dir {
        Some(dir) => Box::new(CachedProvider::new(client, dir)),
        None => Box::new(client),
    };

    let output = bake(&config, provider.as_ref())?;
    tracing::info!(
        placed = output.report.placed,
        skipped = output.report.skipped.len(),
        "scene assembled"
    );

    persist(&output.artifacts, ArtifactSettings::in_dir(&config.output_dir))
}

fn run_scene(
    faces: &Path,
    edges: &Path,
    assembly: &Path,
    out: PathBuf,
) -> assembly_baker_core::Result<()> {
    tracing::info!(?faces, ?edges, ?assembly, "building scene from local files");

    let faces: Vec<PartTessellation> = read_json(faces)?;
    let edges: Vec<PartEdges> = read_json(edges)?;
    let assembly: Assembly = read_json(assembly)?;

    let (artifacts, report) = build_scene(&assembly.root_assembly, &faces, &edges)?;
    tracing::info!(
        placed = report.placed,
        skipped = report.skipped.len(),
        "scene assembled"
    );

    persist(&artifacts, ArtifactSettings::in_dir(out))
}

fn persist(artifacts: &BakeArtifacts, settings: ArtifactSettings) -> assembly_baker_core::Result<()> {
    if artifacts.node_map.is_empty() {
        tracing::warn!("no occurrence was placed; the scene is empty");
    }
    let writer = ArtifactWriter::new(settings);
    let written = writer.write(artifacts)?;
    tracing::info!(
        dir = %writer.settings().output_dir.display(),
        files = written.len(),
        "artifacts written"
    );
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> assembly_baker_core::Result<T> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Bake CAD assemblies into GLB scenes and motion tracks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export the assembly scene and bake motion over the rotation parameter.
    Bake(BakeArgs),
    /// Build the GLB scene and occurrence map from local JSON files.
    Scene {
        /// Tessellated faces JSON.
        #[arg(long)]
        faces: PathBuf,
        /// Tessellated edges JSON.
        #[arg(long)]
        edges: PathBuf,
        /// Assembly definition JSON.
        #[arg(long)]
        assembly: PathBuf,
        /// Output directory.
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct BakeArgs {
    /// Document URL of the assembly element.
    url: String,
    /// Comma separated part studio element ids (discovered from the assembly when omitted).
    #[arg(long)]
    partstudio: Option<String>,
    /// Comma separated angles in degrees (overrides --count).
    #[arg(long)]
    angles: Option<String>,
    /// Number of keyframes over [0, 360).
    #[arg(long, default_value_t = assembly_baker_core::config::DEFAULT_FRAME_COUNT)]
    count: usize,
    /// Output directory.
    #[arg(long, default_value = "out")]
    out: PathBuf,
    /// Directory caching tessellation responses.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Name of the rotation configuration parameter.
    #[arg(long, default_value = assembly_baker_core::config::DEFAULT_ROTATION_PARAMETER)]
    parameter: String,
    /// File holding the API access key and secret key on two lines.
    #[arg(long, default_value = ".secrets")]
    secrets: PathBuf,
}

impl BakeArgs {
    fn to_config(&self) -> assembly_baker_core::Result<BakeConfig> {
        let mut config = BakeConfig::new(DocumentRef::from_url(&self.url)?);
        config.sampling = match &self.angles {
            Some(list) => AngleSampling::parse_list(list)?,
            None => AngleSampling::even(self.count)?,
        };
        config.part_studios = self.partstudio.as_deref().map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        });
        config.rotation_parameter = self.parameter.clone();
        config.output_dir = self.out.clone();
        config.cache_dir = self.cache_dir.clone();
        Ok(config)
    }
}
