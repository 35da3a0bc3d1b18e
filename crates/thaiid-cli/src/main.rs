use anyhow::Context as _;
use clap::{Parser, Subcommand};
use thaiid_card::{PcscHub, ThaiIdReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "thaiid")]
#[command(about = "Thai ID Card Reader - Read Thai national ID cards from PC/SC readers")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch for card insertions and print each card as JSON
    Watch {
        /// Per-command read timeout in seconds
        #[arg(long, default_value_t = 15)]
        read_timeout: u64,
        /// Delay between card insertion and the read cycle, in milliseconds
        #[arg(long, default_value_t = 500)]
        insert_delay: u64,
        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// List connected card readers
    Readers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with environment-based filtering
    // Set RUST_LOG=debug for detailed logs, RUST_LOG=trace for very verbose
    // Default: info level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Watch {
            read_timeout,
            insert_delay,
            pretty,
        } => watch(read_timeout, insert_delay, pretty).await,
        Command::Readers => readers(),
    }
}

async fn watch(read_timeout: u64, insert_delay: u64, pretty: bool) -> anyhow::Result<()> {
    let mut reader = ThaiIdReader::new();
    reader.set_read_timeout(read_timeout);
    reader.set_insert_delay(insert_delay);

    reader.on_read_complete(move |record| {
        let rendered = if pretty {
            serde_json::to_string_pretty(&record)
        } else {
            serde_json::to_string(&record)
        };
        match rendered {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("Failed to serialize card record: {err}"),
        }
    });
    reader.on_read_error(|message| {
        eprintln!("{message}");
    });

    reader
        .init()
        .context("Failed to start the card reader service. Is pcscd running?")?;

    eprintln!("Waiting for card insertion (Ctrl-C to exit)...");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    Ok(())
}

fn readers() -> anyhow::Result<()> {
    let hub = PcscHub::new().context("Failed to establish PC/SC context")?;
    let readers = hub.list_readers().context("Failed to list readers")?;
    if readers.is_empty() {
        println!("No card readers connected");
    } else {
        for name in readers {
            println!("{name}");
        }
    }
    Ok(())
}
