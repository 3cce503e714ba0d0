use clap::Parser;
use log::{info, LevelFilter};
use rand::Rng;
use std::path::PathBuf;

use spotdiff_core::{run, Config, RunSettings};

#[derive(Debug, Parser)]
#[command(name = "spotdiff", version, about = "Spot-the-difference level generator")]
struct Args {
    /// Source image, or a directory of png/jpg images.
    #[arg(default_value = "images_for_ai")]
    input: PathBuf,

    /// Where levels are written when not publishing.
    #[arg(long, default_value = "generated_levels")]
    output: PathBuf,

    /// Seed for the random edits; drawn at random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 4)]
    min_differences: usize,

    #[arg(long, default_value_t = 7)]
    max_differences: usize,

    /// Level id to use instead of the one derived from the file name.
    #[arg(long)]
    level_id: Option<String>,

    /// Upload to the S3-compatible bucket configured through S3_* variables.
    #[arg(long, default_value_t = false)]
    publish: bool,

    /// POST each new level id to WORKER_URL.
    #[arg(long, default_value_t = false)]
    notify: bool,

    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn setup_logging(debug: bool) -> Result<(), log::SetLoggerError> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {:<5} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()
}

fn main() {
    let args = Args::parse();

    if let Err(err) = setup_logging(args.debug) {
        eprintln!("Failed to initialise logging: {err}");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    let seed = match args.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::thread_rng().gen::<u64>();
            info!("no --seed given, using {seed}");
            seed
        }
    };

    let settings = RunSettings {
        seed,
        min_differences: args.min_differences,
        max_differences: args.max_differences,
        publish: args.publish,
        notify: args.notify,
        level_id: args.level_id,
        input_path: args.input,
        output_path: args.output,
    };

    if let Err(err) = run(settings, &config) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_batch_layout() {
        let args = Args::parse_from(["spotdiff"]);
        assert_eq!(args.input, PathBuf::from("images_for_ai"));
        assert_eq!(args.output, PathBuf::from("generated_levels"));
        assert_eq!((args.min_differences, args.max_differences), (4, 7));
        assert!(!args.publish && !args.notify);
    }

    #[test]
    fn single_image_publish_flags() {
        let args = Args::parse_from([
            "spotdiff",
            "photos/harbour.jpg",
            "--seed",
            "17",
            "--level-id",
            "harbour_1",
            "--publish",
            "--notify",
        ]);
        assert_eq!(args.seed, Some(17));
        assert_eq!(args.level_id.as_deref(), Some("harbour_1"));
        assert!(args.publish && args.notify);
    }
}
