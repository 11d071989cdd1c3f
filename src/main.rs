#[macro_use]
extern crate clap;
extern crate linkerd_namer;
#[macro_use]
extern crate log;
extern crate pretty_env_logger;
extern crate tokio;

use clap::{App, Arg};
use linkerd_namer::app::AppConfig;
use std::fs;
use std::process;

static CONFIG_PATH_ARG: &'static str = "PATH";

fn main() {
    // Configure the logger from the RUST_LOG environment variable.
    drop(pretty_env_logger::try_init());

    // Load command-line options.
    let opts = App::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(Arg::with_name(CONFIG_PATH_ARG)
                 .required(true)
                 .index(1)
                 .help("Config file path."))
        .get_matches();

    // Parse configuration file.
    let app = {
        let path = opts.value_of(CONFIG_PATH_ARG).unwrap_or_default();
        let txt = match fs::read_to_string(path) {
            Ok(txt) => txt,
            Err(e) => fail(&format!("failed to read config {}: {}", path, e)),
        };
        let config = match txt.parse::<AppConfig>() {
            Ok(config) => config,
            Err(e) => fail(&format!("configuration error: {}", e)),
        };
        match config.into_app() {
            Ok(app) => app,
            Err(e) => fail(&format!("configuration error: {}", e)),
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
              .thread_name("namer")
              .enable_all()
              .build() {
        Ok(rt) => rt,
        Err(e) => fail(&format!("failed to initialize runtime: {}", e)),
    };

    let handle = runtime.handle().clone();
    let result = runtime.block_on(async move {
        tokio::select! {
            res = app.run(handle) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    });
    if let Err(e) = result {
        fail(&format!("{}", e));
    }

    info!("Closing.")
}

fn fail(msg: &str) -> ! {
    error!("{}", msg);
    eprintln!("{}", msg);
    process::exit(1)
}
