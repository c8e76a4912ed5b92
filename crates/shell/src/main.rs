//! CLI for Tree-DBSCAN, distributed density clustering.

mod commands;
mod output;
mod utils;

use clap::Parser;

use commands::Commands;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log at debug level.
    #[arg(short('v'), long, default_value_t = false)]
    verbose: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    let (_guard, log_path) = utils::configure_logger(&args.command.log_name(), args.verbose)?;
    println!("Log file: {log_path:?}");
    ftlog::info!("{args:?}");

    match args.command {
        Commands::Simulate {
            inp_dir,
            out_dir,
            tree,
            clustering,
            timeout_secs,
        } => commands::simulate::run(&inp_dir, &out_dir, &tree, &clustering, args.verbose, timeout_secs)?,
        Commands::Worker {
            rank,
            inp_path,
            out_dir,
            addresses,
            tree,
            clustering,
            timeout_secs,
        } => commands::worker::run(
            rank,
            &inp_path,
            &out_dir,
            &addresses,
            &tree,
            &clustering,
            args.verbose,
            timeout_secs,
        )?,
        Commands::Generate {
            out_dir,
            num_workers,
            num_blobs,
            points_per_blob,
            dimensionality,
            std_dev,
            side,
            noise,
            seed,
        } => commands::generate::run(
            &out_dir,
            &commands::generate::BlobSpec {
                num_workers,
                num_blobs,
                points_per_blob,
                dimensionality,
                std_dev,
                side,
                noise,
            },
            seed,
        )?,
    }

    Ok(())
}
