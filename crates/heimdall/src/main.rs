use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use heimdall::{
    initialize_root, new_challenge, storage, PresentRequest, RootConfig, RootError, RootResult,
    VerifyRequest,
};
use heimdall_core::FieldElement;

/// Heimdall: privacy-preserving presentations of verifiable credentials
///
/// Issuers maintain a revocation registry, holders disclose selected
/// attributes in zero knowledge, verifiers check them against the
/// published registry root.
#[derive(Parser, Debug)]
#[command(name = "heimdall", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty revocation registry
    RevocNew {
        /// Directory for the registry files
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Replace an existing registry
        #[arg(long)]
        force: bool,
    },

    /// Revoke a credential by identifier
    RevocUpdate {
        /// Credential identifier
        id: u64,

        /// Directory holding the registry files
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Issuer secret key file; signs the new registry root
        #[arg(short, long)]
        secret_key: Option<PathBuf>,
    },

    /// Generate a presentation disclosing the given attribute indices
    Present {
        /// Comma-separated attribute indices, in disclosure order
        #[arg(value_delimiter = ',', required = true)]
        indices: Vec<usize>,

        /// Credential to present
        #[arg(long, default_value = "./credential.json")]
        credential: PathBuf,

        /// Output file for the presentation
        #[arg(short, long, default_value = "./presentation.json")]
        destination: PathBuf,

        /// Challenge from the verifier
        #[arg(long)]
        challenge: FieldElement,

        /// Presentation lifetime in days
        #[arg(short, long)]
        expiration: Option<u32>,

        /// Include the issuer public key in the output
        #[arg(short, long)]
        issuer_pk: bool,

        /// Holder secret key file; signs the challenge
        #[arg(short, long)]
        secret_key: Option<PathBuf>,

        /// Directory holding the registry files
        #[arg(short, long)]
        revocation: Option<PathBuf>,
    },

    /// Verify a stored presentation
    Verify {
        /// Presentation file
        path: PathBuf,

        /// Trusted revocation root (decimal); read from the registry otherwise
        #[arg(long)]
        root: Option<FieldElement>,

        /// Directory holding the registry files
        #[arg(short, long)]
        revocation: Option<PathBuf>,

        /// Reference credential, reports where disclosed values sit
        #[arg(long)]
        credential: Option<PathBuf>,

        /// Trusted issuer public key as `x,y`
        #[arg(long, value_delimiter = ',')]
        issuer_pk: Option<Vec<FieldElement>>,
    },

    /// Print a fresh random challenge
    Challenge,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("heimdall=debug,heimdall_core=debug,heimdall_cred=debug,heimdall_proof=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("heimdall=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> RootResult<RootConfig> {
    match path {
        Some(p) => RootConfig::load(p),
        None => RootConfig::load(&RootConfig::default_config_path()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> RootResult<()> {
    let state = initialize_root(load_config(cli.config.as_ref())?)?;

    match cli.command {
        Commands::RevocNew { destination, force } => {
            let registry = state.create_registry(destination.as_deref(), force)?;
            println!("Revocation registry created.");
            println!("  Depth: {}", registry.depth());
            println!("  Root:  {}", registry.root());
            println!(
                "  Dir:   {}",
                state.registry_store(destination.as_deref()).dir().display()
            );
        }
        Commands::RevocUpdate {
            id,
            destination,
            secret_key,
        } => {
            let update = state.revoke(id, destination.as_deref(), secret_key.as_deref())?;
            if update.changed {
                println!("Credential {id} revoked (block {}, bit {}).", update.position, update.bit);
            } else {
                println!("Credential {id} was already revoked.");
            }
            println!("  Root: {}", update.root);
            if update.changed && secret_key.is_some() {
                println!("  Signed: yes");
            }
        }
        Commands::Present {
            indices,
            credential,
            destination,
            challenge,
            expiration,
            issuer_pk,
            secret_key,
            revocation,
        } => {
            let request = PresentRequest {
                credential,
                indices,
                challenge,
                expiration_days: expiration,
                secret_key,
                disclose_issuer_pk: issuer_pk,
                registry_dir: revocation,
            };
            let presentation = state.present(&request).await?;
            storage::write_presentation(&destination, &presentation)?;

            let expires = presentation
                .output()
                .meta
                .expiration
                .and_then(|ms| ms.to_u64())
                .and_then(|ms| chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms as i64))
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".into());
            info!(kind = %presentation.kind(), path = %destination.display(), "presentation stored");
            println!("Presentation written to {}", destination.display());
            println!("  Type:    {}", presentation.kind());
            println!("  Expires: {expires}");
        }
        Commands::Verify {
            path,
            root,
            revocation,
            credential,
            issuer_pk,
        } => {
            let issuer_pk = match issuer_pk.as_deref() {
                None => None,
                Some(&[x, y]) => Some([x, y]),
                Some(_) => {
                    return Err(RootError::Config("--issuer-pk takes exactly x,y".into()))
                }
            };
            let request = VerifyRequest {
                presentation: path,
                revocation_root: root,
                registry_dir: revocation,
                credential,
                issuer_pk,
            };
            let (presentation, report) = state.verify(&request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("{}", presentation.state());
            if !report.is_valid() {
                return Err(RootError::Rejected(
                    report.failed_checks().into_iter().map(String::from).collect(),
                ));
            }
        }
        Commands::Challenge => println!("{}", new_challenge()),
    }

    Ok(())
}
