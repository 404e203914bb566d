//! CLI for the sealed-bid auction ledger.
//!
//! This binary provides commands for:
//! - Connecting a development identity
//! - Listing auctions
//! - Creating auctions
//! - Placing bids and ending auctions

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClientBuilder;
use tracing::info;

use vickrey_client::{AuctionClient, Endpoint, Environment};
use vickrey_types::{Identity, Principal, SessionToken, DEFAULT_SERVICE_ID};

#[derive(Parser)]
#[command(name = "vickrey-cli")]
#[command(about = "CLI for the sealed-bid auction ledger")]
struct Cli {
    /// Ledger RPC endpoint (defaults to the environment's gateway)
    #[arg(long, env = "AUCTION_RPC_URL")]
    rpc: Option<String>,

    /// Service endpoint identifier on the ledger host
    #[arg(long, env = "AUCTION_SERVICE_ID", default_value = DEFAULT_SERVICE_ID)]
    service: String,

    /// Principal of the connected identity (hex)
    #[arg(long, env = "AUCTION_PRINCIPAL")]
    principal: Option<String>,

    /// Session token issued by the identity provider
    #[arg(long, env = "AUCTION_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a development identity and print its credential
    Connect,

    /// List auctions with their authoritative state
    List,

    /// Create a new auction
    Create {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Duration in seconds
        #[arg(long, default_value_t = 3600)]
        duration: u64,

        /// Minimum acceptable winning price
        #[arg(long, default_value_t = 100)]
        reserve_price: u64,
    },

    /// Place a bid on an auction
    Bid {
        #[arg(long)]
        auction_id: u64,

        #[arg(long)]
        amount: u64,
    },

    /// End an auction you own
    End {
        #[arg(long)]
        auction_id: u64,
    },
}

impl Cli {
    fn endpoint(&self, environment: Environment) -> Endpoint {
        let host = self
            .rpc
            .clone()
            .unwrap_or_else(|| environment.host().to_string());
        Endpoint::new(host, self.service.clone())
    }

    fn identity(&self) -> Result<Identity> {
        let principal = self
            .principal
            .as_deref()
            .ok_or_else(|| anyhow!("--principal (or AUCTION_PRINCIPAL) is required"))?;
        let token = self
            .token
            .clone()
            .ok_or_else(|| anyhow!("--token (or AUCTION_TOKEN) is required"))?;
        Ok(Identity::new(
            Principal::from_text(principal)?,
            SessionToken::new(token),
        ))
    }
}

async fn connect_cmd(endpoint: &Endpoint, principal: Option<String>) -> Result<()> {
    let client = HttpClientBuilder::default().build(endpoint.url())?;
    let identity: Identity = client.request("auth_connect", vec![principal]).await?;

    info!(principal = %identity.principal, "identity connected");
    println!("Connected.");
    println!("  Principal: {}", identity.principal);
    println!("  Token:     {}", identity.token);
    println!();
    println!("Export for later commands:");
    println!("  export AUCTION_PRINCIPAL={}", identity.principal);
    println!("  export AUCTION_TOKEN={}", identity.token);
    Ok(())
}

async fn list_cmd(client: &AuctionClient) -> Result<()> {
    client.refresh_auctions().await?;
    let auctions = client.current_auctions();

    if auctions.is_empty() {
        println!("No auctions found");
    } else {
        println!("Auctions:");
        for a in auctions {
            println!(
                "  [{}] {} - {} (reserve {}, ends {}, owner {})",
                a.id, a.title, a.state, a.reserve_price, a.end_time, a.owner
            );
        }
    }
    Ok(())
}

async fn create_cmd(
    client: &AuctionClient,
    title: &str,
    description: &str,
    duration: u64,
    reserve_price: u64,
) -> Result<()> {
    let auction_id = client
        .create_auction(title, description, duration, reserve_price)
        .await?;
    println!("Auction ID: {}", auction_id);
    Ok(())
}

async fn bid_cmd(client: &AuctionClient, auction_id: u64, amount: u64) -> Result<()> {
    let accepted = client.place_bid(auction_id, amount).await?;
    if accepted {
        println!("Bid accepted");
        println!("  Auction ID: {}", auction_id);
        println!("  Amount: {}", amount);
    } else {
        println!("Bid rejected: check the auction state and the reserve price");
    }
    Ok(())
}

async fn end_cmd(client: &AuctionClient, auction_id: u64) -> Result<()> {
    match client.end_auction(auction_id).await? {
        Some(settlement) => {
            println!("Auction {} settled:", auction_id);
            println!("  Winner: {}", settlement.winner);
            println!("  Price: {}", settlement.price);
        }
        None => {
            println!("Auction {} ended with no qualifying winner", auction_id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vickrey_cli=info".parse().unwrap())
                .add_directive("vickrey_client=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let environment = Environment::from_env();
    let endpoint = cli.endpoint(environment);

    let client = AuctionClient::with_endpoint(environment, endpoint.clone());

    match &cli.command {
        Commands::Connect => {
            connect_cmd(&endpoint, cli.principal.clone()).await?;
        }

        Commands::List => {
            list_cmd(&client).await?;
        }

        Commands::Create {
            title,
            description,
            duration,
            reserve_price,
        } => {
            client.sign_in(cli.identity()?).await?;
            create_cmd(&client, title, description, *duration, *reserve_price).await?;
        }

        Commands::Bid { auction_id, amount } => {
            client.sign_in(cli.identity()?).await?;
            bid_cmd(&client, *auction_id, *amount).await?;
        }

        Commands::End { auction_id } => {
            client.sign_in(cli.identity()?).await?;
            end_cmd(&client, *auction_id).await?;
        }
    }

    Ok(())
}
