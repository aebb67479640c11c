//! signfield command line
//!
//! Design a field layout over a PDF, export it as a config, and flatten a
//! filled-in layout into a signed copy.

mod commands;
mod rasterizer;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use signfield_core::FieldType;
use signfield_scene::DEFAULT_RENDER_SCALE;

#[derive(Parser, Debug)]
#[command(name = "signfield")]
#[command(version, about = "Place signature fields on PDFs and flatten filled layouts")]
struct Args {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page count and page sizes
    Inspect {
        pdf: PathBuf,
    },

    /// Add a field to a layout config, creating the config if needed
    AddField {
        pdf: PathBuf,

        #[arg(long)]
        config: PathBuf,

        /// signature, text, date or stamp
        #[arg(long = "type", value_parser = parse_field_type)]
        field_type: FieldType,

        /// 1-indexed page
        #[arg(long, default_value = "1")]
        page: u32,

        /// Left edge as a fraction of the page width
        #[arg(long)]
        x: f64,

        /// Top edge as a fraction of the page height
        #[arg(long)]
        y: f64,

        /// Text or date value
        #[arg(long, conflicts_with = "image")]
        value: Option<String>,

        /// PNG or JPEG used as a signature or stamp value
        #[arg(long)]
        image: Option<PathBuf>,

        /// Mark the field as not required
        #[arg(long)]
        optional: bool,
    },

    /// Fill in or change a field already in the layout config
    SetField {
        pdf: PathBuf,

        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        id: String,

        /// Text or date value
        #[arg(long, conflicts_with_all = ["image", "clear"])]
        value: Option<String>,

        /// PNG or JPEG used as a signature or stamp value
        #[arg(long, conflicts_with = "clear")]
        image: Option<PathBuf>,

        /// Remove the field's value
        #[arg(long)]
        clear: bool,

        #[arg(long, conflicts_with = "optional")]
        required: bool,

        #[arg(long)]
        optional: bool,
    },

    /// Drop a field from the layout config
    RemoveField {
        pdf: PathBuf,

        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        id: String,
    },

    /// Write the layout config next to the document's name
    ExportConfig {
        pdf: PathBuf,

        /// Existing config to re-export
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, env = "SIGNFIELD_OUT_DIR", default_value = ".")]
        out_dir: PathBuf,
    },

    /// Burn the config's fields into a signed copy of the document
    Flatten {
        pdf: PathBuf,

        #[arg(long)]
        config: PathBuf,

        #[arg(long, env = "SIGNFIELD_OUT_DIR", default_value = ".")]
        out_dir: PathBuf,

        /// Leave placeholders for unfilled signatures unlabeled
        #[arg(long)]
        no_labels: bool,
    },

    /// Print the interactive scene of one page as JSON
    Scene {
        pdf: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Pixels per PDF point
        #[arg(
            long,
            env = "SIGNFIELD_SCALE",
            default_value_t = DEFAULT_RENDER_SCALE,
            value_parser = parse_scale
        )]
        scale: f64,
    },
}

fn parse_field_type(s: &str) -> Result<FieldType, String> {
    FieldType::parse(s).ok_or_else(|| format!("unknown field type '{}'", s))
}

/// Pixels per point accepted by `scene`
const SCALE_RANGE: std::ops::RangeInclusive<f64> = 0.1..=8.0;

fn parse_scale(s: &str) -> Result<f64, String> {
    let scale: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if SCALE_RANGE.contains(&scale) {
        Ok(scale)
    } else {
        Err(format!(
            "scale must be between {} and {}",
            SCALE_RANGE.start(),
            SCALE_RANGE.end()
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries command output; logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("signfield v{}", env!("CARGO_PKG_VERSION"));

    let output = match args.command {
        Command::Inspect { pdf } => commands::inspect(&pdf)?,
        Command::AddField {
            pdf,
            config,
            field_type,
            page,
            x,
            y,
            value,
            image,
            optional,
        } => commands::add_field(
            &pdf,
            &config,
            commands::NewField {
                field_type,
                page,
                x,
                y,
                value,
                image,
                required: !optional,
            },
        )?,
        Command::SetField {
            pdf,
            config,
            id,
            value,
            image,
            clear,
            required,
            optional,
        } => commands::set_field(
            &pdf,
            &config,
            &id,
            commands::FieldEdit {
                value,
                image,
                clear_value: clear,
                required: match (required, optional) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            },
        )?,
        Command::RemoveField { pdf, config, id } => {
            commands::remove_field(&pdf, &config, &id)?
        }
        Command::ExportConfig {
            pdf,
            config,
            out_dir,
        } => commands::export_config(&pdf, config.as_deref(), &out_dir)?,
        Command::Flatten {
            pdf,
            config,
            out_dir,
            no_labels,
        } => commands::flatten(&pdf, &config, &out_dir, !no_labels)?,
        Command::Scene {
            pdf,
            config,
            page,
            scale,
        } => commands::scene(&pdf, config.as_deref(), page, scale).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_is_bounded() {
        assert_eq!(parse_scale("1.5"), Ok(1.5));
        assert!(parse_scale("0").is_err());
        assert!(parse_scale("1e9").is_err());
        assert!(parse_scale("NaN").is_err());
        assert!(parse_scale("big").is_err());
    }
}
