use clap::Parser;
use garden_client::network::GardenerClient;
use garden_client::sweep::SweepOrder;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Gardener id written into claimed plots
    #[arg(short = 'i', long, default_value = "1")]
    id: i32,

    /// Milliseconds spent on each plot
    #[arg(short = 't', long, default_value = "100")]
    working_time: i32,

    /// Order in which plots are visited
    #[arg(long, value_enum, default_value_t = SweepOrder::Rows)]
    sweep: SweepOrder,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!(
        "Gardener {} connecting to {} ({:?} sweep, {}ms per plot)",
        args.id, args.server, args.sweep, args.working_time
    );

    let result = match GardenerClient::connect(&args.server, args.id, args.working_time).await {
        Ok(gardener) => gardener.run_sweep(args.sweep).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(worked) => {
            info!("Worked {} plots", worked);
            println!("Work is done (gardener {})", args.id);
        }
        Err(e) => {
            error!("Gardener {} stopped: {}", args.id, e);
            eprintln!("gardener: {}", e);
            std::process::exit(1);
        }
    }
}
