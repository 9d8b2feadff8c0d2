//! `wsse-sign`: sign or verify SOAP envelopes from the command line.
//!
//! Run with: `wsse-sign sign --config wsse.yaml request.xml -o signed.xml`

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wssecurity_cert::{verify_document, Settings, WsSecurityCert};

/// WS-Security X.509 signer for SOAP messages.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a signed security header to a SOAP envelope
    Sign {
        /// Path to configuration file (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Envelope to sign; stdin when omitted
        input: Option<PathBuf>,

        /// Where to write the signed envelope; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check the signature of an envelope signed with the same configuration
    Verify {
        /// Path to configuration file (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Envelope to verify; stdin when omitted
        input: Option<PathBuf>,
    },
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn load_settings(path: &Path) -> Result<Settings> {
    Settings::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Sign {
            config,
            input,
            output,
        } => {
            let settings = load_settings(&config)?;
            let signer = WsSecurityCert::new(settings.signer_config()?)
                .context("Failed to set up signer")?;
            let document = read_input(input.as_deref())?;
            let signed = signer.sign(&document).context("Failed to sign document")?;
            log::info!("signed with security token {}", signer.token_id());

            match output {
                Some(path) => std::fs::write(&path, signed)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => std::io::stdout()
                    .write_all(signed.as_bytes())
                    .context("Failed to write stdout")?,
            }
        }
        Command::Verify { config, input } => {
            let settings = load_settings(&config)?;
            let document = read_input(input.as_deref())?;
            let verified =
                verify_document(&document).context("Signature verification failed")?;
            verified
                .require(&settings.references)
                .context("Signature does not cover the configured references")?;
            for reference in &verified.references {
                println!(
                    "{} {}",
                    reference.local_name,
                    reference.uri.as_deref().unwrap_or("-")
                );
            }
            println!("verified with security token {}", verified.token_id);
        }
    }

    Ok(())
}
