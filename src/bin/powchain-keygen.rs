#![forbid(unsafe_code)]
//! Key utilities: generate an identity or sign a transfer for `/transactions/send`.

use clap::{Parser, Subcommand};
use powchain::crypto::{validate_address, KeyPair};
use powchain::transaction::{iso_now, SignedTransactionRequest, TransactionDraft};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generates a new private key, public key and address
    Generate,
    /// Prints the JSON body of a signed transfer
    Sign {
        /// Sender private key (64 hex digits)
        #[arg(long)]
        private_key: String,
        /// Recipient address (40 hex digits)
        #[arg(long)]
        to: String,
        #[arg(long)]
        value: u64,
        #[arg(long, default_value_t = 10)]
        fee: u64,
        /// Optional free-form payload
        #[arg(long)]
        data: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate => {
            let keypair = KeyPair::generate();
            println!("Private key: {}", keypair.private_key_hex());
            println!("Public key:  {}", keypair.public_key_hex());
            println!("Address:     {}", keypair.address());
        }
        Commands::Sign {
            private_key,
            to,
            value,
            fee,
            data,
        } => {
            validate_address(&to)?;
            let keypair = KeyPair::from_private_key_hex(&private_key)?;
            let draft = TransactionDraft {
                from: keypair.address(),
                to,
                value,
                fee,
                date_created: iso_now(),
                data,
                sender_pub_key: keypair.public_key_hex(),
            };
            let sender_signature = keypair.sign(&draft.data_hash())?;
            let request = SignedTransactionRequest {
                draft,
                sender_signature,
            };
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }

    Ok(())
}
