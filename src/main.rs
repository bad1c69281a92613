mod config;
mod error;
mod models;
mod pipeline;
mod scraper;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::models::{CommonSellers, SellerItem};
use crate::pipeline::{Collector, REQUIRED_FIELDS};
use crate::scraper::{decode_envelope, extract_hidden_fields, extract_seller_items, HttpClient, PageTransport};
use crate::utils::{parse_headers, parse_key_value, sanitize_cookie_header, split_urls};

#[derive(Parser)]
#[command(name = "card-market-finder", about = "Find sellers offering every given Cardmarket product", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Extra header as 'Name: value'. Repeatable; applies to GET and POST.
    #[arg(long = "header", global = true)]
    headers: Vec<String>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one product page and print its hidden fields and sellers
    Get {
        #[arg(long)]
        url: String,

        /// Cookie header value to include in the request
        #[arg(long, env = "CMF_COOKIE")]
        cookie: String,
    },

    /// POST multipart/form-data and decode the load-more response
    Post {
        #[arg(long)]
        post_url: String,

        /// Form field as key=value (repeatable)
        #[arg(long = "form")]
        forms: Vec<String>,

        /// File field as fieldName=path/to/file (repeatable)
        #[arg(long = "file")]
        files: Vec<String>,

        #[arg(long, env = "CMF_COOKIE")]
        cookie: Option<String>,
    },

    /// Collect every page of each URL and print the sellers common to all
    Collect {
        #[arg(long, env = "CMF_COOKIE")]
        cookie: String,

        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Prompt for a cookie once, then for URL lists until an empty line (default)
    Interactive,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "card_market_finder=info,warn",
        1 => "card_market_finder=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let headers = parse_headers(&cli.headers).context("Invalid --header")?;
    let client = HttpClient::new(&config.client, &headers)?;

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Get { url, cookie } => {
            let html = client.fetch_page(&url, Some(&cookie)).await?;
            let fields = extract_hidden_fields(&html, &REQUIRED_FIELDS)?;
            for name in REQUIRED_FIELDS {
                println!("{}={}", name, fields[name]);
            }
            print_items(&extract_seller_items(&html));
        }

        Command::Post {
            post_url,
            forms,
            files,
            cookie,
        } => {
            let forms = forms
                .iter()
                .map(|f| parse_key_value(f).context("Invalid --form"))
                .collect::<Result<Vec<_>>>()?;
            let files = files
                .iter()
                .map(|f| {
                    parse_key_value(f)
                        .map(|(field, path)| (field, PathBuf::from(path)))
                        .context("Invalid --file")
                })
                .collect::<Result<Vec<_>>>()?;
            let fields: Vec<(&str, &str)> = forms.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

            let text = client
                .post_multipart(&post_url, &fields, &files, cookie.as_deref())
                .await?;
            let envelope = decode_envelope(&text)?;
            print_items(&extract_seller_items(&envelope.rows_html));
            println!("newPage={}", envelope.next_page);
        }

        Command::Collect { cookie, urls } => {
            for url in &urls {
                reqwest::Url::parse(url).with_context(|| format!("Invalid URL {:?}", url))?;
            }
            let cookie = sanitize_cookie_header(&cookie);
            let collector = Collector::new(&client, &config);
            let common = collector.run_round(&urls, non_empty(&cookie)).await?;
            print_common(&common);
        }

        Command::Interactive => interactive(&Collector::new(&client, &config)).await?,
    }

    Ok(())
}

async fn interactive(collector: &Collector<'_>) -> Result<()> {
    println!("Step 1: Provide request details");
    let Some(raw) = prompt(
        "Enter Cookie header value(s). Paste only cookie pairs (e.g., name=value; name2=value2).\n\
         If you pasted a Set-Cookie string with attributes, they will be ignored.\n> ",
    )?
    else {
        return Ok(());
    };
    let cookie = sanitize_cookie_header(&raw);
    debug!("Using cookie with {} pairs", cookie.split("; ").filter(|p| !p.is_empty()).count());

    loop {
        let Some(line) = prompt("Enter one or more URLs to GET (comma-separated), or press Enter to quit: ")?
        else {
            break;
        };
        if line.is_empty() {
            break;
        }

        let urls = split_urls(&line);
        if urls.is_empty() {
            eprintln!("Error: no valid URLs provided.");
            continue;
        }
        if let Some(bad) = urls.iter().find(|u| reqwest::Url::parse(u).is_err()) {
            eprintln!("Error: invalid URL {}", bad);
            continue;
        }

        let round = collector
            .run_round(&urls, non_empty(&cookie))
            .instrument(info_span!("round", urls = urls.len()));
        match round.await {
            Ok(common) => print_common(&common),
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    info!("Bye");
    Ok(())
}

/// Print `message`, read one trimmed line. `None` on end of input.
fn prompt(message: &str) -> Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    Ok((read > 0).then(|| line.trim().to_string()))
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn print_items(items: &[SellerItem]) {
    for item in items {
        println!("{}", item);
    }
}

fn print_common(common: &CommonSellers) {
    for (href, prices) in common {
        println!("sellerHref={} | prices=[{}]", href, prices.join(", "));
    }
}
