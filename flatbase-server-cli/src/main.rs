use std::path::PathBuf;

use env_logger::Env;
use flatbase_server::{serve, ServerOptions};
use log::info;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "flatbase-server",
    about = "Serve a directory of flat-file tables over flatbase's query protocol."
)]
struct Opt {
    /// Directory holding one subdirectory per database (each with a
    /// metadata.json and one CSV file per table) plus user.csv.
    #[structopt(long("storage-root"), short("d"), default_value = "./data")]
    storage_root: PathBuf,
    /// Host address the server listens on.
    #[structopt(long("host"), default_value = "127.0.0.1")]
    host: String,
    /// Port the server listens on.
    #[structopt(short, default_value = "8080")]
    port: u16,
    /// HMAC secret used to sign access/refresh tokens. Falls back to the
    /// `FLATBASE_SECRET` environment variable; a process restart with a
    /// different secret invalidates every outstanding token.
    #[structopt(long("secret"), env = "FLATBASE_SECRET")]
    secret: String,
    /// Access token lifetime, in minutes.
    #[structopt(long("access-minutes"), default_value = "25")]
    access_minutes: i64,
    /// Refresh token lifetime, in days.
    #[structopt(long("refresh-days"), default_value = "7")]
    refresh_days: i64,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opt = Opt::from_args();
    let opts = ServerOptions::new(opt.storage_root, opt.secret.into_bytes())
        .with_host(opt.host)
        .with_port(opt.port)
        .with_access_token_minutes(opt.access_minutes)
        .with_refresh_token_days(opt.refresh_days);

    info!("starting flatbase-server on {}", opts.bind_addr());
    serve(&opts).await
}
