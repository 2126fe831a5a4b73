// SPDX-FileCopyrightText: 2020 Serokell <https://serokell.io/>
// SPDX-FileCopyrightText: 2021 Yannik Sander <contact@ysndr.de>
//
// SPDX-License-Identifier: MPL-2.0

use clap::Parser;
use deploy_tag::cli;
use log::log;

#[tokio::main]
async fn main() {
    match cli::run(cli::Opts::parse()).await {
        Ok(()) => (),
        Err(err) => {
            match err.log_level() {
                Some(level) => log!(level, "{}", err),
                None => eprintln!("{}", err),
            }
            std::process::exit(err.exit_code());
        }
    }
}
