use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use retrofund::config::ServerConfig;
use retrofund::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "retrofund",
    about = "Serve retro funding pools over HTTP or score a sample round locally",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default when no subcommand is given)
    Serve(ServeArgs),
    /// Score a two-application sample round in memory and print the payout split
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Bind host, overriding APP_HOST
    #[arg(long)]
    host: Option<String>,
    /// Bind port, overriding APP_PORT
    #[arg(long)]
    port: Option<u16>,
}

impl ServeArgs {
    pub(crate) fn apply(self, server: &mut ServerConfig) {
        if let Some(host) = self.host {
            server.host = host;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    match Cli::parse().command {
        Some(Command::Demo(args)) => run_demo(args).await,
        Some(Command::Serve(args)) => server::run(args).await,
        None => server::run(ServeArgs::default()).await,
    }
}
