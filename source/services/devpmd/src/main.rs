// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: devpmd entrypoint wiring config, logging and the Unix socket transport

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "devpmd", about = "Forced storage power-state control service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the control socket path
    #[arg(short, long)]
    socket: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let mut config = match devpmd::DaemonConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("devpmd: {err}");
            std::process::exit(1);
        }
    };
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    env_logger::Builder::from_env(env).init();

    if let Err(err) = devpmd::service_main_loop(&config, devpmd::ReadyNotifier::new(|| {})) {
        eprintln!("devpmd: exited with error: {err}");
        std::process::exit(1);
    }
}
