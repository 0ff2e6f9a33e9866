//! CLI arguments and server configuration defaults.

use clap::Parser;

pub const DEFAULT_PORT: u16 = 8001;
pub const DOCUMENT_FILE: &str = "file.json";
pub const COMPROVANTES_DIR: &str = "comprovantes";
pub const BOLETOS_DIR: &str = "boletos";
pub const PAID_STATUS: &str = "PAID";
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "dues-server", version, about = "Dues tracking backend server")]
pub struct Args {
    #[arg(
        short = 'd',
        long,
        env = "DUES_ROOT_DIR",
        default_value = ".",
        help = "Root directory holding the document, uploads and static assets"
    )]
    pub root_dir: String,
    #[arg(
        short = 'b',
        long,
        env = "DUES_BIND",
        default_value = "127.0.0.1",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "DUES_PORT",
        default_value_t = DEFAULT_PORT,
        help = "HTTP port"
    )]
    pub port: u16,
}
