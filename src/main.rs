use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ogify::markup;
use ogify::models::{
    AppConfig, ElementNode, EmojiStyle, FontDescriptor, FontStyle, ImageElement, ImageFormat,
    ImageRequest, RenderOptions, RenderedArtifact,
};
use ogify::server;
use ogify::services::RenderPipeline;

#[derive(Parser)]
#[command(name = "ogify")]
#[command(about = "Render HTML-like markup to SVG/PNG social preview images")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Render markup or an element tree (JSON) to an image file
    Render {
        /// Input file, or "-" for stdin
        #[arg(short, long)]
        input: PathBuf,

        /// Output image file path
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        /// "png" or "svg"
        #[arg(short, long, default_value = "png")]
        format: ImageFormat,

        /// Emoji style: twemoji, openmoji, blobmoji, noto, fluent, fluentFlat
        #[arg(long)]
        emoji: Option<EmojiStyle>,

        /// Font file as PATH:NAME[:WEIGHT]; repeatable
        #[arg(long = "font")]
        fonts: Vec<String>,

        /// Log the element tree and disable caching headers
        #[arg(long)]
        debug: bool,
    },
    /// Print the element tree built from markup as JSON
    Tree {
        /// Input file, or "-" for stdin
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Render {
            input,
            output,
            width,
            height,
            format,
            emoji,
            fonts,
            debug,
        }) => {
            let options = RenderOptions {
                width,
                height,
                format,
                emoji,
                debug,
                fonts: fonts
                    .iter()
                    .map(String::as_str)
                    .map(parse_font_arg)
                    .collect::<anyhow::Result<_>>()?,
                ..Default::default()
            };
            run_render_command(&input, &output, options).await
        }
        Some(Commands::Tree { input }) => run_tree_command(&input),
        Some(Commands::Serve) | None => run_server().await,
    }
}

fn init_cli_tracing() {
    // Minimal logging for CLI; stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ogify=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))
    }
}

/// JSON objects are element trees; anything else is markup.
fn parse_element(content: String) -> anyhow::Result<ImageElement> {
    if content.trim_start().starts_with('{') {
        let tree: ElementNode =
            serde_json::from_str(&content).context("Failed to parse element tree JSON")?;
        Ok(ImageElement::Tree(tree))
    } else {
        Ok(ImageElement::Markup(content))
    }
}

/// `PATH:NAME[:WEIGHT]`
fn parse_font_arg(arg: &str) -> anyhow::Result<FontDescriptor> {
    let mut parts: Vec<&str> = arg.split(':').collect();
    let weight = match parts.last().map(|w| w.parse::<u16>()) {
        Some(Ok(weight)) if parts.len() >= 3 => {
            parts.pop();
            weight
        }
        _ => 400,
    };
    let name = parts
        .pop()
        .filter(|name| !name.is_empty())
        .context("Font argument must be PATH:NAME[:WEIGHT]")?;
    if parts.is_empty() {
        anyhow::bail!("Font argument must be PATH:NAME[:WEIGHT]");
    }
    let path = parts.join(":");

    let data = std::fs::read(&path).with_context(|| format!("Failed to read font {path}"))?;
    Ok(FontDescriptor {
        name: name.to_string(),
        data,
        weight,
        style: FontStyle::Normal,
    })
}

/// Render an image directly to a file (no server needed)
async fn run_render_command(
    input: &Path,
    output: &Path,
    options: RenderOptions,
) -> anyhow::Result<()> {
    init_cli_tracing();

    let config = AppConfig::from_env();
    let pipeline = RenderPipeline::from_config(&config)?;
    let element = parse_element(read_input(input)?)?;

    let artifact = pipeline
        .render(ImageRequest { element, options })
        .await
        .context("Render failed")?;

    let kind = match &artifact {
        RenderedArtifact::Svg(_) => "SVG",
        RenderedArtifact::Png(_) => "PNG",
    };
    let bytes = artifact.into_bytes();
    std::fs::write(output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Wrote {} ({kind}, {} bytes)", output.display(), bytes.len());
    Ok(())
}

fn run_tree_command(input: &Path) -> anyhow::Result<()> {
    init_cli_tracing();

    let markup = read_input(input)?;
    let tree = markup::try_build_tree(&markup).context("Failed to build element tree")?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

async fn run_server() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ogify=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let config = AppConfig::from_env();
    let state = server::create_app_state(config)?;

    // Warm up in the background; requests wait on the same bootstrap
    let engines = state.pipeline.engines().clone();
    tokio::spawn(async move {
        if let Err(e) = engines.ensure_ready().await {
            tracing::error!(%e, "Engine warm-up failed");
        }
    });

    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "ogify server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_element_detects_tree_json() {
        let element = parse_element(r#"{"type": "div", "props": {}}"#.to_string()).unwrap();
        assert!(matches!(element, ImageElement::Tree(tree) if tree.tag_name == "div"));

        let element = parse_element("<div>hi</div>".to_string()).unwrap();
        assert!(matches!(element, ImageElement::Markup(_)));
    }

    #[test]
    fn test_parse_font_arg() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"font-bytes").unwrap();
        let path = file.path().display().to_string();

        let font = parse_font_arg(&format!("{path}:Inter:700")).unwrap();
        assert_eq!(font.name, "Inter");
        assert_eq!(font.weight, 700);
        assert_eq!(font.data, b"font-bytes");

        let font = parse_font_arg(&format!("{path}:Inter")).unwrap();
        assert_eq!(font.weight, 400);

        assert!(parse_font_arg("Inter").is_err());
    }
}
