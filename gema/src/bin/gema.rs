// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executable program to run gema, the gem5 simulation control plane

use camino::Utf8PathBuf;
use clap::Parser;
use gema::run_openapi;
use gema::run_server;
use gema::Config;
use std::net::SocketAddr;

#[derive(Debug, Parser)]
#[clap(name = "gema", about = "Remote control plane for gem5 simulations")]
struct Args {
    #[clap(
        short = 'O',
        long = "openapi",
        help = "Print the external OpenAPI Spec document and exit",
        action
    )]
    openapi: bool,

    #[clap(
        long = "bind-address",
        help = "Listen on this address instead of the configured one",
        action
    )]
    bind_address: Option<SocketAddr>,

    #[clap(
        name = "CONFIG_FILE_PATH",
        action,
        required_unless_present = "openapi"
    )]
    config_file_path: Option<Utf8PathBuf>,
}

#[derive(Debug)]
enum CmdError {
    Usage(String),
    Failure(String),
}

fn fatal(cmd_error: CmdError) -> ! {
    let arg0 = std::env::args().next().unwrap_or_else(|| "gema".to_string());
    let (code, message) = match cmd_error {
        CmdError::Usage(m) => (2, m),
        CmdError::Failure(m) => (1, m),
    };
    eprintln!("{}: {}", arg0, message);
    std::process::exit(code);
}

#[tokio::main]
async fn main() {
    if let Err(cmd_error) = do_run().await {
        fatal(cmd_error);
    }
}

async fn do_run() -> Result<(), CmdError> {
    let args = Args::parse();

    if args.openapi {
        return run_openapi().map_err(CmdError::Failure);
    }

    let config_file_path = args.config_file_path.ok_or_else(|| {
        CmdError::Usage("a configuration file is required".to_string())
    })?;
    let mut config = Config::from_file(&config_file_path)
        .map_err(|e| CmdError::Failure(e.to_string()))?;
    if let Some(bind_address) = args.bind_address {
        config.dropshot.bind_address = bind_address;
    }

    run_server(config).await.map_err(CmdError::Failure)
}
