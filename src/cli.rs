use std::net::SocketAddr;
use std::path::PathBuf;

use certgen::params::parse_duration;
use chrono::Duration;
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Generate a self-signed X.509 certificate and key for TLS")]
pub struct Args {
    /// Sub‑commands (generate, serve)
    #[command(subcommand)]
    pub sub: Option<Cmd>,

    #[command(flatten)]
    pub cert: CertArgs,

    /// Path to configuration file (defaults to <config dir>/certgen/certgen.toml when present)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
}

/// Certificate flags. Unset values come from the config file, then built-in defaults.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CertArgs {
    /// Comma-separated hostnames and IPs to generate a certificate for
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Creation date formatted as "Jan 1 15:04:05 2011", in UTC [default: now]
    #[arg(long = "start-date", global = true)]
    pub start_date: Option<String>,

    /// Duration that certificate is valid for, e.g. 8760h or 1h30m [default: 8760h]
    #[arg(long, global = true, allow_hyphen_values = true, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Whether this cert should be its own Certificate Authority (`--ca=false` overrides the config file)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub ca: Option<bool>,

    /// Size of RSA key to generate. Ignored if --ecdsa-curve is set [default: 2048]
    #[arg(long = "rsa-bits", global = true)]
    pub rsa_bits: Option<usize>,

    /// ECDSA curve to use to generate a key. Valid values are P224, P256, P384, P521
    #[arg(long = "ecdsa-curve", global = true)]
    pub ecdsa_curve: Option<String>,

    /// Filename for the Certificate File [default: cert.pem]
    #[arg(long, global = true)]
    pub certfile: Option<PathBuf>,

    /// Filename for the Key File [default: key.pem]
    #[arg(long, global = true)]
    pub pemfile: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Write the certificate and key files (default if no sub‑command)
    Generate,
    /// Serve "Hello" over HTTPS with an ephemeral self-signed certificate
    Serve {
        /// Address to listen on [default: 127.0.0.1:8443]
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
}
