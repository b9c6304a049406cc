//! BucketDB CLI Client
//!
//! Command-line interface driving a store on a running bucketdb-server.

use clap::{Parser, Subcommand};
use bucketdb::{BucketError, ConsistencyMode, RecordId, RemoteBackend, Store, StoreConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// BucketDB CLI
#[derive(Parser, Debug)]
#[command(name = "bucketdb-cli")]
#[command(about = "CLI for BucketDB record stores")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7379")]
    server: String,

    /// Store name
    #[arg(short = 'n', long, default_value = "bucketdb")]
    store: String,

    /// Skip WATCH-based conflict detection
    #[arg(long)]
    unguarded: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create records, one per payload; prints the new ids
    Create {
        #[arg(required = true)]
        payloads: Vec<String>,
    },

    /// Print records by id
    Get {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Replace the payload of a record
    Update { id: String, payload: String },

    /// Delete records by id
    #[command(alias = "del")]
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Glob search over payloads
    Search {
        #[arg(default_value = "")]
        pattern: String,
    },

    /// Regular expression search, one result line per pattern
    Regexp {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Number of records
    Count,

    /// Store diagnostics
    Info,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> bucketdb::Result<()> {
    let backend = RemoteBackend::connect(args.server.as_str())?;

    let consistency = if args.unguarded {
        ConsistencyMode::Unguarded
    } else {
        ConsistencyMode::Optimistic
    };
    let config = StoreConfig::builder()
        .name(&args.store)
        .consistency(consistency)
        .build();
    let store = Store::open(backend, config)?;

    match args.command {
        Commands::Create { payloads } => {
            for id in store.batch_create(&payloads)? {
                println!("{}", id);
            }
        }
        Commands::Get { ids } => {
            let ids = parse_ids(&ids)?;
            for record in store.batch_get(&ids)? {
                println!("{}\t{}", record.id, String::from_utf8_lossy(&record.data));
            }
        }
        Commands::Update { id, payload } => {
            store.update(id.parse()?, payload)?;
        }
        Commands::Delete { ids } => {
            store.batch_delete(&parse_ids(&ids)?)?;
        }
        Commands::Search { pattern } => {
            print_ids(&store.search(pattern)?);
        }
        Commands::Regexp { patterns } => {
            for (pattern, ids) in patterns.iter().zip(store.regexp_search(&patterns)?) {
                print!("{}\t", pattern);
                print_ids(&ids);
            }
        }
        Commands::Count => {
            println!("{}", store.count()?);
        }
        Commands::Info => {
            for (key, value) in store.info()? {
                println!("{}: {}", key, value);
            }
        }
    }

    store.close()
}

fn parse_ids(raw: &[String]) -> Result<Vec<RecordId>, BucketError> {
    raw.iter().map(|id| id.parse()).collect()
}

fn print_ids(ids: &[RecordId]) {
    let rendered: Vec<String> = ids.iter().map(RecordId::to_string).collect();
    println!("{}", rendered.join(" "));
}
