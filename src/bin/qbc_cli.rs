//! QBC CLI - Bridge interface for request handlers
//!
//! Commands: lattices, encode, decode, render
//! Outputs JSON (or SVG for render) to stdout
//! Returns 2 on malformed or unverified payloads, 1 on other failures

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use qbc_core::{
    logging, Codec, CodecConfig, CodecError, EncodeRequest, Orientation, RenderRequest,
};

#[derive(Parser)]
#[command(name = "qbc-cli")]
#[command(about = "QBC CLI - Lattice Geometric Text Codec")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to lattices directory (overrides config)
    #[arg(short, long)]
    lattices_dir: Option<PathBuf>,

    /// Path to JSON config file
    #[arg(short, long, default_value = "qbc.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = logging::default_log_level())]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List available lattices
    Lattices,

    /// Encode text into an encoded path
    Encode {
        /// Text to encode
        #[arg(short, long)]
        text: String,

        /// Lattice ID (default lattice when omitted)
        #[arg(short, long)]
        lattice: Option<String>,
    },

    /// Decode an encoded path
    Decode {
        /// JSON payload (EncodedPath)
        #[arg(short, long)]
        payload: String,

        /// Decode against this lattice instead of the payload's own
        #[arg(short, long)]
        lattice: Option<String>,
    },

    /// Render text as SVG
    Render {
        /// Text to render
        #[arg(short, long)]
        text: String,

        /// Lattice ID (default lattice when omitted)
        #[arg(short, long)]
        lattice: Option<String>,

        /// Emit an inline fragment instead of a standalone document
        #[arg(long)]
        fragment: bool,

        /// Emit the document as a base64 data URI
        #[arg(long, conflicts_with = "fragment")]
        data_uri: bool,

        /// Output height in pixels (256 for documents, the configured glyph size for fragments)
        #[arg(short, long)]
        size: Option<u32>,

        /// normal, rotate90, rotate180, rotate270, flip-horizontal, flip-vertical
        #[arg(short, long, value_parser = parse_orientation)]
        orientation: Option<Orientation>,

        /// Draw anchor nodes
        #[arg(long)]
        nodes: bool,

        /// Draw the lattice grid
        #[arg(long)]
        grid: bool,
    },
}

const DOCUMENT_SIZE: u32 = 256;

fn parse_orientation(s: &str) -> Result<Orientation, String> {
    s.parse()
}

fn emit(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => println!(r#"{{"success": false, "error": "{}"}}"#, e),
    }
}

fn failure(e: &CodecError) -> ExitCode {
    emit(&serde_json::json!({
        "success": false,
        "error": e.to_string(),
    }));
    if e.is_malformed_payload() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(&cli.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let mut config = match CodecConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => return failure(&e),
    };
    if let Some(dir) = cli.lattices_dir {
        config.lattices_dir = dir;
    }

    let codec = Codec::from_config(&config);

    match cli.command {
        Commands::Lattices => {
            let default = codec.catalog().default_id().ok();
            let lattices: Vec<_> = codec
                .catalog()
                .ids()
                .into_iter()
                .map(|id| match codec.lattice(Some(id.as_str())) {
                    Ok(l) => serde_json::json!({
                        "id": id,
                        "anchors": l.anchor_count(),
                        "rules_version": l.rules().version,
                        "mapped": l.rules().mapping.len(),
                        "default": default.as_deref() == Some(id.as_str()),
                    }),
                    Err(e) => serde_json::json!({
                        "id": id,
                        "error": e.to_string(),
                    }),
                })
                .collect();

            emit(&serde_json::json!(lattices));
            ExitCode::SUCCESS
        }

        Commands::Encode { text, lattice } => {
            match codec.encode(&EncodeRequest { text, lattice_id: lattice }) {
                Ok(encoded) => {
                    emit(&serde_json::json!(encoded));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(&e),
            }
        }

        Commands::Decode { payload, lattice } => {
            let result = match lattice {
                Some(id) => qbc_core::decoder::parse_payload(&payload)
                    .and_then(|path| codec.decode_with(&path, &id)),
                None => codec.decode_json(&payload),
            };
            match result {
                Ok(decoded) => {
                    emit(&serde_json::json!(decoded));
                    if decoded.verified {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2) // Verification mismatch
                    }
                }
                Err(e) => failure(&e),
            }
        }

        Commands::Render { text, lattice, fragment, data_uri, size, orientation, nodes, grid } => {
            let style = match codec.lattice(lattice.as_deref()) {
                Ok(l) => {
                    let mut style = l.default_style().clone();
                    style.show_nodes |= nodes;
                    style.show_grid |= grid;
                    style
                }
                Err(e) => return failure(&e),
            };

            let request = RenderRequest {
                text,
                lattice_id: lattice,
                style: Some(style),
                orientation: orientation.unwrap_or(config.orientation),
                standalone: !fragment,
                size: size.unwrap_or(if fragment { codec.glyph_size() } else { DOCUMENT_SIZE }),
            };

            if data_uri {
                return match codec.render_graphic(&request) {
                    Ok(graphic) => {
                        let (width, height) = graphic.dimensions(request.size);
                        println!("{}", graphic.to_data_uri(width, height));
                        ExitCode::SUCCESS
                    }
                    Err(e) => failure(&e),
                };
            }

            match codec.render_svg(&request) {
                Ok(svg) => {
                    print!("{}", svg);
                    ExitCode::SUCCESS
                }
                Err(e) => failure(&e),
            }
        }
    }
}
