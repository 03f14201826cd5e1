//! `amp` - resolve media requests from the command line
//!
//! ```text
//! amp resolve https://res.cloudinary.com/demo/image/upload/cat.jpg \
//!     --accept "image/avif,image/webp,*/*" --ect 3g --dpr 2 --viewport-width 390
//! amp measure https://res.cloudinary.com/demo/image/upload/w_640,q_70,f_webp/cat.jpg
//! amp config > amp.toml
//! ```

use amp_capability::ClientHintsProvider;
use amp_pipeline::{HttpLoader, MediaPipeline, PreloadHint};
use amp_types::{
    CapabilityProfile, FormatPreference, MediaRequest, PipelineConfig, PlaceholderStrategy,
    Quality, ResolvedMedia,
};
use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ResolveReport {
    profile: CapabilityProfile,
    resolved: ResolvedMedia,
    srcset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    preload: Option<String>,
}

fn cli() -> Command {
    Command::new("amp")
        .version(amp_pipeline::VERSION)
        .about("Adaptive media pipeline")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Pipeline configuration (TOML)"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve one media request and print it as JSON")
                .arg(Arg::new("source").required(true).help("Source image reference"))
                .arg(
                    Arg::new("quality")
                        .long("quality")
                        .default_value("80")
                        .value_parser(value_parser!(u32))
                        .help("Nominal quality (1-100)"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("auto")
                        .help("auto, avif, webp, jpeg or png"),
                )
                .arg(
                    Arg::new("sizes")
                        .long("sizes")
                        .default_value("100vw")
                        .help("sizes attribute passed through to the output"),
                )
                .arg(
                    Arg::new("width")
                        .long("width")
                        .value_parser(value_parser!(u32))
                        .help("Intrinsic width; defaults to the viewport breakpoint"),
                )
                .arg(
                    Arg::new("placeholder")
                        .long("placeholder")
                        .default_value("blur")
                        .value_parser(["blur", "none"])
                        .help("Placeholder strategy"),
                )
                .arg(
                    Arg::new("priority")
                        .long("priority")
                        .action(ArgAction::SetTrue)
                        .help("Treat as a priority request and print its preload tag"),
                )
                .arg(
                    Arg::new("measure")
                        .long("measure")
                        .action(ArgAction::SetTrue)
                        .help("Fetch the primary locator and attach metrics"),
                )
                .arg(
                    Arg::new("header")
                        .long("header")
                        .short('H')
                        .action(ArgAction::Append)
                        .help("Client hint header as NAME:VALUE (repeatable)"),
                )
                .arg(Arg::new("accept").long("accept").help("Accept header"))
                .arg(Arg::new("ect").long("ect").help("Effective connection type"))
                .arg(
                    Arg::new("save-data")
                        .long("save-data")
                        .action(ArgAction::SetTrue)
                        .help("Send Save-Data: on"),
                )
                .arg(
                    Arg::new("downlink")
                        .long("downlink")
                        .value_parser(value_parser!(f64))
                        .help("Downlink estimate in Mbps"),
                )
                .arg(
                    Arg::new("dpr")
                        .long("dpr")
                        .value_parser(value_parser!(f64))
                        .help("Device pixel ratio"),
                )
                .arg(
                    Arg::new("viewport-width")
                        .long("viewport-width")
                        .value_parser(value_parser!(u32))
                        .help("Viewport width in CSS pixels"),
                ),
        )
        .subcommand(
            Command::new("measure")
                .about("Fetch a locator and print estimated metrics as JSON")
                .arg(Arg::new("url").required(true).help("Locator to fetch")),
        )
        .subcommand(Command::new("config").about("Print the effective configuration as TOML"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<PipelineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn client_hints(args: &ArgMatches) -> Result<ClientHintsProvider> {
    let mut headers: Vec<(String, String)> = Vec::new();
    if let Some(raw) = args.get_many::<String>("header") {
        for header in raw {
            let Some((name, value)) = header.split_once(':') else {
                bail!("header {header:?} is not NAME:VALUE");
            };
            headers.push((name.to_string(), value.to_string()));
        }
    }
    if let Some(accept) = args.get_one::<String>("accept") {
        headers.push(("accept".to_string(), accept.clone()));
    }
    if let Some(ect) = args.get_one::<String>("ect") {
        headers.push(("ect".to_string(), ect.clone()));
    }
    if args.get_flag("save-data") {
        headers.push(("save-data".to_string(), "on".to_string()));
    }
    if let Some(downlink) = args.get_one::<f64>("downlink") {
        headers.push(("downlink".to_string(), downlink.to_string()));
    }
    if let Some(dpr) = args.get_one::<f64>("dpr") {
        headers.push(("sec-ch-dpr".to_string(), dpr.to_string()));
    }
    if let Some(width) = args.get_one::<u32>("viewport-width") {
        headers.push(("sec-ch-viewport-width".to_string(), width.to_string()));
    }
    Ok(ClientHintsProvider::from_headers(headers))
}

fn media_request(args: &ArgMatches) -> Result<MediaRequest> {
    let source = args
        .get_one::<String>("source")
        .context("missing source")?;
    let quality = args.get_one::<u32>("quality").copied().unwrap_or(80);
    let format: FormatPreference = args
        .get_one::<String>("format")
        .map_or(Ok(FormatPreference::Auto), |f| f.parse())?;
    let placeholder = match args.get_one::<String>("placeholder").map(String::as_str) {
        Some("none") => PlaceholderStrategy::None,
        _ => PlaceholderStrategy::Blur,
    };

    let mut request = MediaRequest::new(source.clone())
        .with_quality(Quality::new(quality)?)
        .with_format(format)
        .with_placeholder(placeholder)
        .with_priority(args.get_flag("priority"))
        .with_lazy(false);
    if let Some(sizes) = args.get_one::<String>("sizes") {
        request = request.with_layout_sizes(sizes.clone());
    }
    request.width = args.get_one::<u32>("width").copied();
    Ok(request)
}

async fn resolve(config: PipelineConfig, args: &ArgMatches) -> Result<()> {
    let provider = client_hints(args)?;
    let request = media_request(args)?;
    let loader = HttpLoader::new(HTTP_TIMEOUT)?;
    let pipeline = MediaPipeline::new(config, Arc::new(provider), Arc::new(loader));

    let handle = pipeline.resolve(request, None).await;
    if args.get_flag("measure") {
        if let Err(err) = handle.load().await {
            tracing::warn!(error = %err, "measurement failed; printing unmeasured resolution");
        }
    }

    let resolved = handle.resolved().context("request did not resolve")?;
    let report = ResolveReport {
        profile: CapabilityProfile::clone(&pipeline.service().ensure_detected().await.profile),
        srcset: resolved.srcset_attribute(),
        preload: handle
            .is_preloading()
            .then(|| PreloadHint::for_resolved(&resolved).to_link_tag()),
        resolved,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    handle.unmount();
    Ok(())
}

async fn measure(config: PipelineConfig, args: &ArgMatches) -> Result<()> {
    let url = args.get_one::<String>("url").context("missing url")?;
    let loader = HttpLoader::new(HTTP_TIMEOUT)?;
    let pipeline = MediaPipeline::new(
        config,
        Arc::new(ClientHintsProvider::default()),
        Arc::new(loader),
    );

    let handle = pipeline
        .resolve(MediaRequest::new(url.clone()).with_lazy(false), None)
        .await;
    let metrics = handle.load().await?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("resolve", args)) => resolve(config, args).await,
        Some(("measure", args)) => measure(config, args).await,
        Some(("config", _)) => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        _ => Ok(()),
    }
}
