use std::{
    net::{Ipv4Addr, SocketAddr},
    str::FromStr,
};

use kbucket_store::{Config, ContactStore, Id, Node};

use clap::Parser;

use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Fill a routing table with random peers and look up the closest ones to a target.
struct Cli {
    /// Number of random peers to offer to the routing table
    #[arg(short, long, default_value_t = 5000)]
    nodes: usize,
    /// Bucket capacity
    #[arg(short, default_value_t = 20)]
    k: usize,
    /// Hex encoded 160 bits target, random if missing
    target: Option<String>,
    /// Log every rejected peer
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::TRACE
        } else {
            Level::DEBUG
        })
        .init();

    let local = Node::new(Id::random(), SocketAddr::from((Ipv4Addr::LOCALHOST, 6881)));

    let config = Config {
        bucket_capacity: cli.k,
        ..Default::default()
    };
    let mut table = ContactStore::new(local, config).expect("valid config");

    let mut accepted = 0;
    for i in 0..cli.nodes {
        let address = SocketAddr::from((Ipv4Addr::new(10, 0, (i >> 8) as u8, i as u8), 6881));

        if table.add(Node::new(Id::random(), address)).unwrap() {
            accepted += 1;
        }
    }

    println!(
        "Offered {} peers, accepted {accepted}, table size {}",
        cli.nodes,
        table.len()
    );

    let target = match cli.target {
        Some(hex) => Id::from_str(&hex).expect("Expected a 160 bits hex target"),
        None => Id::random(),
    };

    println!("\nClosest {} peers to {target}:", cli.k);
    for node in table.closest(&target, cli.k).unwrap() {
        println!(
            "  {} {:>21} distance bits: {}",
            node.id(),
            node.address(),
            target.distance(node.id()).bit_length()
        );
    }

    if let Some(oldest) = table.least_recently_seen() {
        println!("\nLeast recently seen: {}", oldest.id());
    }

    table.clear();
    println!("\nCleared, table size {}", table.len());
}
