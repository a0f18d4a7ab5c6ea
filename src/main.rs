// CLI binary entry point for retag

mod cli;

use anyhow::Result;
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

use cli::{commands, Commands, Config, OutputFormatter, RetagOptions};
use retag::{ExistsPolicy, ImageFormat, PictureType};

fn init_logging(config: &Config) {
    if config.quiet {
        return;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: &Config) -> Result<()> {
    let formatter = OutputFormatter::new(config.format, config.quiet);

    match &config.command {
        Commands::Read {
            files,
            include_data,
            output,
        } => commands::command_read(files, *include_data, output.as_deref(), &formatter),
        Commands::Detect { files } => commands::command_detect(files, &formatter),
        Commands::ExportCover {
            file,
            output,
            index,
        } => commands::command_export_cover(file, output, *index, &formatter).map(|_| ()),
        Commands::Retag {
            file,
            output,
            set,
            cover,
            png,
            picture_type,
            force,
        } => {
            let options = RetagOptions {
                set,
                cover: cover.as_deref(),
                format: if *png { ImageFormat::Png } else { ImageFormat::Jpeg },
                picture_type: PictureType::from_u32(*picture_type, "--picture-type")?,
                policy: if *force {
                    ExistsPolicy::Replace
                } else {
                    ExistsPolicy::Fail
                },
            };
            commands::command_retag(file, output, &options, &formatter)
        }
    }
}

fn main() {
    let config = Config::parse();
    init_logging(&config);

    if let Err(e) = run(&config) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
