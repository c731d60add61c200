use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use themegen_core::{GeneratedTheme, PipelineEvent, Stage, ThemeConfig, ThemeGenerator};

/// Images larger than this are rejected before decoding.
const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "themegen", about = "Generate a Telegram .attheme theme from an image")]
struct Cli {
    /// JPEG, PNG or WebP image to sample colors from
    image: PathBuf,

    /// Theme name; defaults to the image file name
    #[arg(short, long)]
    name: Option<String>,

    /// Directory the .attheme file is written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// JSON file with pipeline settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of colors to extract
    #[arg(long)]
    max_colors: Option<usize>,

    /// How many validation warnings to print
    #[arg(long, default_value_t = 5)]
    show_warnings: usize,

    /// Largest accepted image file, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BYTES)]
    max_bytes: u64,

    /// Print the generated theme and its validation report as JSON
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ThemeConfig::load(path)?,
        None => ThemeConfig::default(),
    };
    if let Some(max_colors) = cli.max_colors {
        config.sampler.max_colors = max_colors;
    }
    config.validate().context("invalid settings")?;

    let bytes = read_image(&cli.image, cli.max_bytes)?;
    let name = cli.name.clone().unwrap_or_else(|| theme_name_for(&cli.image));

    let generator = ThemeGenerator::new(config);
    let mut handle = generator.generate_named(bytes, name);

    let theme = loop {
        match handle.next_event().await {
            Some(PipelineEvent::Stage(Stage::Done)) => log::info!("done"),
            Some(PipelineEvent::Stage(stage)) => log::info!("{stage}..."),
            Some(PipelineEvent::Finished(Ok(theme))) => break theme,
            Some(PipelineEvent::Finished(Err(failure))) => {
                log::debug!("{failure:?}");
                bail!(failure.user_message());
            }
            None => bail!("theme generation was cancelled"),
        }
    };

    let path = write_theme(&theme, &cli.out_dir)?;
    println!("Wrote {}", path.display());

    let warnings = theme.validation().top_warnings(cli.show_warnings);
    for warning in warnings {
        println!("warning: {warning}");
    }
    let hidden = theme.validation().warnings.len() - warnings.len();
    if hidden > 0 {
        println!("({hidden} more warnings)");
    }

    if cli.report {
        println!("{}", serde_json::to_string_pretty(&theme)?);
    }

    Ok(())
}

fn read_image(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let size = fs::metadata(path)
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    if size > max_bytes {
        bail!(
            "{} is {size} bytes, the limit is {max_bytes}. Try a smaller image.",
            path.display()
        );
    }
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn theme_name_for(image: &Path) -> String {
    image
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| ThemeConfig::default().theme_name)
}

fn write_theme(theme: &GeneratedTheme, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let path = out_dir.join(theme.file_name());
    fs::write(&path, theme.content())
        .with_context(|| format!("writing theme to {}", path.display()))?;
    Ok(path)
}
