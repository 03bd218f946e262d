use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use xflash_core::{FlashSession, SessionConfig, TransferError};

#[derive(Parser, Debug)]
#[command(author, version, about = "XMODEM-CRC firmware flasher over TCP byte links", long_about = None)]
struct Args {
    /// `host:port` of the serial bridge in front of the device
    #[arg(long)]
    address: Option<String>,

    /// Path to the firmware image
    #[arg(long)]
    firmware: Option<String>,

    /// TOML session config; command line flags override it
    #[arg(long)]
    config: Option<String>,

    /// NAK retries allowed per packet
    #[arg(long)]
    max_failures: Option<usize>,

    /// Link connect timeout in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Abort the transfer after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Send the image as is instead of padding it to whole blocks
    #[arg(long)]
    no_pad: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path))?,
        None => SessionConfig::default(),
    };

    if let Some(address) = &args.address {
        config.address = Some(address.clone());
    }
    if let Some(firmware) = &args.firmware {
        config.firmware_path = Some(firmware.clone());
    }
    if let Some(max_failures) = args.max_failures {
        config.max_failures = max_failures;
    }
    if let Some(ms) = args.connect_timeout_ms {
        config.connect_timeout_ms = ms;
    }
    if args.timeout_secs.is_some() {
        config.transfer_timeout_secs = args.timeout_secs;
    }
    if args.no_pad {
        config.pad_image = false;
    }

    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    info!("Starting xflash...");

    if let Err(e) = FlashSession::new(config).run().await {
        if let Some(TransferError::ReceiverCancelled) = e.downcast_ref::<TransferError>() {
            error!("Firmware image was rejected by the device (CAN received)");
        } else {
            error!("Error: {:#}", e);
        }
        std::process::exit(1);
    }

    info!("Firmware transferred");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "xflash",
            "--address",
            "10.0.0.2:6638",
            "--firmware",
            "image.gbl",
            "--max-failures",
            "7",
            "--timeout-secs",
            "90",
            "--no-pad",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.address.as_deref(), Some("10.0.0.2:6638"));
        assert_eq!(config.firmware_path.as_deref(), Some("image.gbl"));
        assert_eq!(config.max_failures, 7);
        assert_eq!(config.connect_timeout_ms, 1000);
        assert_eq!(config.transfer_timeout_secs, Some(90));
        assert!(!config.pad_image);
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let args = Args::parse_from(["xflash", "--config", "/nonexistent/xflash.toml"]);
        let err = build_config(&args).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
