//! Terminal client for a vidgate server: submits a URL, sits out the gate,
//! then saves the streamed file.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::AsyncWriteExt;

use vidgate::client::{self, FlowEvent, HttpApi, SecondTicker};

/// Fetch a video through a vidgate server.
#[derive(Debug, Parser)]
#[command(name = "grab")]
struct Cli {
    /// Video page URL to fetch.
    url: String,

    /// Output format: mp4 or mp3.
    #[arg(long, default_value = "mp4")]
    format: String,

    /// Base URL of the vidgate server.
    #[arg(long, default_value = "http://127.0.0.1:8787")]
    server: String,

    /// Directory to save the downloaded file into.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("Failed: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let api = HttpApi::new(cli.server);
    let mut ticker = SecondTicker;

    let path = match client::run_flow(&api, &mut ticker, &cli.url, &cli.format, print_event).await
    {
        Ok(path) => path,
        // the flow already printed its own failure line
        Err(_) => std::process::exit(1),
    };

    let mut response = api.fetch_download(&path).await?;

    let target = cli.out.join(client::saved_file_name(&path));
    let mut file = tokio::fs::File::create(&target).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    println!("Saved {}", target.display());
    Ok(())
}

fn print_event(event: FlowEvent) {
    match event {
        FlowEvent::Status(message) => println!("{message}"),
        FlowEvent::Countdown(remaining) => println!("You can continue in {remaining}s"),
        FlowEvent::ConfirmReady => println!("Continuing..."),
    }
}
