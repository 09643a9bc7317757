use clap::Parser;
use garden_client::observer::ObserverClient;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Prints the garden server's event stream")]
struct Args {
    /// Observer address of the server
    #[arg(short = 's', long, default_value = "127.0.0.1:8081")]
    server: String,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = Args::parse();
    let client = match ObserverClient::connect(&args.server).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("observer: {}", e);
            std::process::exit(1);
        }
    };

    let mut stdout = std::io::stdout();
    match client.run(&mut stdout).await {
        Ok(lines) => info!("Server closed the stream after {} lines", lines),
        Err(e) => {
            error!("Server connection lost: {}", e);
            eprintln!("observer: {}", e);
            std::process::exit(1);
        }
    }
}
