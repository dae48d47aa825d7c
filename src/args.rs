/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Interactive shell over an in-memory virtual filesystem", long_about = None)]
pub struct Args {
    #[arg(
        long,
        help = "Path to configuration file in TOML format",
        default_value_t = String::from("./vsh.toml"),
    )]
    pub config_path: String,

    #[arg(long, help = "Reject every mutating operation")]
    pub read_only: bool,

    #[arg(long, help = "Rebase absolute paths beneath this directory")]
    pub base: Option<String>,

    #[arg(help = "Script with one command per line; read from stdin when omitted")]
    pub script: Option<String>,
}
