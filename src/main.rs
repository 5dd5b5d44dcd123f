use clap::Parser;
use tracing_subscriber::EnvFilter;

use vcf_annotator::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("vcf_annotator=debug,info")
    } else {
        EnvFilter::new("vcf_annotator=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Annotate(args) => {
            cli::annotate::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Index(args) => {
            cli::index::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
