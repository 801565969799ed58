use std;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{info, error, LevelFilter};

use shape_server_lib::config::Config as ServerConfig;
use shape_server_lib::spawn_http_server;
use shape_server_lib::ui::run_app;
use shape_server_lib::world::WorldModel;

use clap;
use clap::{arg, ArgAction, ArgMatches, command};
use clap::parser::ValueSource;
use simplelog::{ColorChoice, CombinedLogger, TerminalMode, TermLogger, WriteLogger, Config};


fn run_service(config: ServerConfig, headless: bool) {
    let start = Instant::now();

    info!("loading data from {}...", config.data_dir.display());
    let world_model = match WorldModel::from_config(&config) {
        Ok(model) => Arc::new(model),
        Err(err) => {
            error!("unable to load data: {err}");
            return;
        }
    };
    info!("loading completed in {:?}", start.elapsed());

    let (handle, http_stop_tx) = spawn_http_server(world_model.clone(), &config);

    if headless {
        // the http server keeps running until its thread ends
        if handle.join().is_err() {
            error!("http server thread panicked");
        }
        return;
    }

    run_app(world_model, config.start_tile_x, config.start_tile_y, Duration::from_millis(config.tick_millis));

    info!("app stopped");
    http_stop_tx.send(()).ok();
    if handle.join().is_err() {
        error!("http server thread panicked");
    }
}


fn parse_args() -> ArgMatches {
    command!()
        .next_line_help(true)
        .arg(
            arg!(--loglevel <LEVEL>)
                .required(false)
                .default_value("debug")
                .value_parser(["trace", "debug", "info", "warn", "error", "off" ])
                .action(ArgAction::Set)
        )
        .arg(
            arg!(--logfile [FILE_NAME])
                .required(false)
                .default_value("shape_server.log")
                .action(ArgAction::Set)
                .help("Enables logging to a file. Disabled by default")
        )
        .arg(
            arg!(-q --quiet)
                .required(false)
                .action(ArgAction::SetTrue)
                .help("Disables output to the terminal")
        )
        .arg(
            arg!(--config <FILE_NAME>)
                .required(false)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set)
                .help("Json file with the session configuration")
        )
        .arg(
            arg!(--"data-dir" <DIR>)
                .required(false)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set)
                .help("Directory with the game data files, overrides the config")
        )
        .arg(
            arg!(--headless)
                .required(false)
                .action(ArgAction::SetTrue)
                .help("Runs only the http server, without the viewer window")
        )
        .get_matches()
}


fn initialize_logging(matches: &ArgMatches) {
    let loglevel = match matches.get_one::<String>("loglevel") {
        None => LevelFilter::Off,
        Some(level) => {
            match level.as_str() {
                "trace" => LevelFilter::Trace,
                "debug" => LevelFilter::Debug,
                "info" => LevelFilter::Info,
                "warn" => LevelFilter::Warn,
                "error" => LevelFilter::Error,
                "off" => LevelFilter::Off,
                _ => unreachable!(),
            }
        }
    };
    let quiet = matches.get_flag("quiet");
    let term_loglevel = if quiet { LevelFilter::Off } else { loglevel };

    let logfile = match (matches.value_source("logfile"), matches.get_one::<String>("logfile")) {
        (Some(ValueSource::CommandLine), Some(file_name)) => {
            Some(file_name)
        },
        _ => None,
    };

    let result = match logfile.map(File::create) {
        Some(Ok(file)) => {
            CombinedLogger::init(
                vec![
                    TermLogger::new(term_loglevel, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
                    WriteLogger::new(loglevel, Config::default(), file)
                ]
            )
        }
        Some(Err(err)) => {
            eprintln!("unable to create log file: {err}");
            TermLogger::init(term_loglevel, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        }
        None => TermLogger::init(term_loglevel, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
    };

    if let Err(err) = result {
        eprintln!("unable to initialize logging: {err}");
    }
}


fn load_config(matches: &ArgMatches) -> Option<ServerConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => match ServerConfig::read(path) {
            Ok(config) => config,
            Err(err) => {
                error!("unable to read config {}: {err}", path.display());
                return None;
            }
        },
        None => ServerConfig::default(),
    };

    if let Some(data_dir) = matches.get_one::<PathBuf>("data-dir") {
        config.data_dir = data_dir.clone();
    }

    Some(config)
}


fn main() {
    let matches = parse_args();
    initialize_logging(&matches);

    if let Some(config) = load_config(&matches) {
        run_service(config, matches.get_flag("headless"));
    }
}
