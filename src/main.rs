use clap::Parser;

use pose_relay::capture_loop::LoopState;
use pose_relay::cli::{handle_config_action, run_collector, run_tracker, Args, Command};
use pose_relay::config::Config;

fn main() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    args.apply_overrides(&mut config);

    let result = match &args.command {
        Some(Command::Config { action }) => {
            handle_config_action(action.clone(), &config, args.config.as_deref())
        }
        Some(Command::Serve { .. }) => run_collector(&config.collector.bind),
        None => match run_tracker(&config) {
            Ok(LoopState::NoCamera) => {
                eprintln!("Error: no usable camera. Check --left and that ffmpeg is installed.");
                std::process::exit(1);
            }
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
