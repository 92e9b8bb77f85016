use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use mask_cli::EditScript;
use mask_editor::{
    EditingSession, EditorCommand, EditorConfig, HttpUploadGateway, MaskBytes, UploadGateway,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Editor configuration (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an edit script over an image and write the mask
    Edit {
        /// Source photo (PNG or JPEG)
        #[arg(short, long)]
        image: PathBuf,
        /// Edit script with the commands to replay
        #[arg(short, long)]
        script: Option<PathBuf>,
        /// Where to write mask.png
        #[arg(short, long, default_value = "mask.png")]
        output: PathBuf,
    },
    /// Replay an edit script and upload the resulting mask
    Upload {
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long)]
        script: Option<PathBuf>,
        /// Also keep a local copy of the uploaded mask
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload the source photo to the image endpoint
    UploadImage {
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Print the JSON schema of editor commands
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Edit { image, script, output } => {
            let mask = render_mask(&config, image, script.as_deref())?;
            write_mask(&mask, output)?;
        }
        Commands::Upload { image, script, output } => {
            let mask = render_mask(&config, image, script.as_deref())?;
            if let Some(output) = output {
                write_mask(&mask, output)?;
            }
            let gateway = HttpUploadGateway::new(&config.gateway)?;
            report(gateway.upload_mask(mask).await)?;
        }
        Commands::UploadImage { image } => {
            let file_name = image
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| eyre!("Image path has no file name: {:?}", image))?
                .to_string();
            let bytes = std::fs::read(image)?;
            let gateway = HttpUploadGateway::new(&config.gateway)?;
            report(gateway.upload_image(file_name, bytes).await)?;
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&EditorCommand::schema())?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading editor config from {:?}", path);
            EditorConfig::from_file(path)?
        }
        None => EditorConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn render_mask(config: &EditorConfig, image: &Path, script: Option<&Path>) -> Result<MaskBytes> {
    let bytes = std::fs::read(image)?;
    let mut session = EditingSession::from_image_bytes(config.clone(), &bytes)?;
    info!("Loaded {:?} into a {}x{} canvas", image, session.surface().width(), session.surface().height());

    let script = match script {
        Some(path) => EditScript::from_file(path)?,
        None => EditScript::default(),
    };
    info!("Replaying {} commands", script.commands.len());
    Ok(script.render(&mut session)?)
}

fn write_mask(mask: &MaskBytes, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, mask.as_bytes())?;
    info!("✅ Wrote {} byte mask to {:?}", mask.len(), output);
    Ok(())
}

fn report(result: mask_editor::Result<mask_editor::UploadReceipt>) -> Result<()> {
    match result {
        Ok(receipt) => {
            println!("{}", receipt.message().unwrap_or("Upload succeeded"));
            Ok(())
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            Err(eyre!(e.user_message()))
        }
    }
}
