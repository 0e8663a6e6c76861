use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use url::Url;

use webrascal::codec::UrlMeta;
use webrascal::config::runtime::merge_partial;
use webrascal::config::{ProxyConfig, RuntimeConfig};
use webrascal::controller::messages::Message;
use webrascal::rewrite::Rewriter;

#[derive(Parser)]
#[command(name = "webrascal-cli")]
#[command(about = "Encode URLs, run the rewriters and talk to a running webrascal server", long_about = None)]
struct Cli {
    /// Base URL of a running server.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Proxy prefix used by the offline commands.
    #[arg(long, default_value = "/webrascal/")]
    prefix: String,

    /// Codec used by the offline commands.
    #[arg(long, default_value = "base64")]
    codec: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Content {
    Html,
    Css,
    Js,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the proxied form of a URL
    Encode { target: String },
    /// Print the real URL behind a proxied one
    Decode { proxied: String },
    /// Rewrite a file as if it had been served from `base`
    Rewrite {
        file: PathBuf,
        #[arg(long, value_enum, default_value = "html")]
        kind: Content,
        #[arg(long)]
        base: String,
    },
    /// Check server status
    Status,
    /// Show the active configuration
    Config,
    /// Merge a partial JSON configuration and push it to the server
    SetConfig { json: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Encode { ref target } => {
            let cfg = offline_config(&cli)?;
            let target = Url::parse(target)?;
            let encoded = Rewriter::passthrough().rewrite_url(&cfg, target.as_str(), &UrlMeta::new(target.clone()));
            println!("{}{}", cfg.codec().origin_str(), encoded);
        }
        Commands::Decode { ref proxied } => {
            let cfg = offline_config(&cli)?;
            println!("{}", cfg.codec().decode(proxied));
        }
        Commands::Rewrite {
            ref file,
            kind,
            ref base,
        } => {
            let cfg = offline_config(&cli)?;
            let source = std::fs::read_to_string(file)?;
            let base = Url::parse(base)?;
            let meta = UrlMeta::new(base.clone());
            let rewriter = Rewriter::passthrough();
            let out = match kind {
                Content::Html => rewriter.rewrite_html(&cfg, &source, &meta, true),
                Content::Css => rewriter.rewrite_css(&cfg, &source, &meta),
                Content::Js => rewriter.rewrite_js(&cfg, &source, base.as_str(), &meta, false),
            };
            println!("{}", out);
        }
        Commands::Status => {
            let res = client.get(format!("{}/__webrascal/status", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Config => {
            let res = client.get(format!("{}/__webrascal/config", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::SetConfig { ref json } => {
            let current: ProxyConfig = client
                .get(format!("{}/__webrascal/config", cli.url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let partial: Value = serde_json::from_str(json)?;
            let config = merge_partial(&current, partial)?;
            let res = client
                .post(format!("{}/__webrascal/message", cli.url))
                .json(&Message::LoadConfig { config })
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn offline_config(cli: &Cli) -> Result<RuntimeConfig, Box<dyn std::error::Error>> {
    let mut config = ProxyConfig::default();
    config.prefix = cli.prefix.clone();
    config.codec.algorithm = cli.codec.clone();
    Ok(RuntimeConfig::compile(config, Url::parse(&cli.url)?)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if status.is_success() {
        let body: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        eprintln!("Error: {} - {}", status, res.text().await?);
    }
    Ok(())
}
