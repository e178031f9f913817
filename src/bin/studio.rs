//! Headless studio session: upload an image, run one generation through the
//! retrying controller and record the result in local history.
//!
//! Configured through the environment (or `.env`):
//! `STUDIO_IMAGE`, `STUDIO_PROMPT`, `STUDIO_STYLE`, optional
//! `STUDIO_CREATIVITY`, `STUDIO_STRENGTH`, `STUDIO_MANUAL_RETRIES`.

use std::{env, path::Path, sync::Arc};

use ai_studio::{
    config::ClientConfig,
    controller::{ControllerEvent, GenerationController},
    history::{HistoryStore, KvFile},
    image_utils::format_file_size,
    models::{GenerationRequest, Style},
    transport::HttpTransport,
};
use anyhow::{anyhow, Context};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, error};
use tracing_subscriber::{fmt, EnvFilter};

fn mime_for(path: &Path) -> anyhow::Result<&'static str> {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        _ => Err(anyhow!("Please upload a PNG or JPG file")),
    }
}

fn env_percent(key: &str) -> anyhow::Result<Option<u8>> {
    match env::var(key) {
        Ok(v) => Ok(Some(v.trim().parse().with_context(|| format!("{} must be 0-100", key))?)),
        Err(_) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = ClientConfig::from_env();
    let image_path = env::var("STUDIO_IMAGE").context("STUDIO_IMAGE is required")?;
    let prompt = env::var("STUDIO_PROMPT").context("STUDIO_PROMPT is required")?;
    let style: Style = env::var("STUDIO_STYLE")
        .context("STUDIO_STYLE is required")?
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let mut manual_retries: u32 = env::var("STUDIO_MANUAL_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(1);

    let path = Path::new(&image_path);
    let bytes = tokio::fs::read(path).await.with_context(|| format!("reading {}", path.display()))?;
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("upload").to_string();

    let transport = Arc::new(HttpTransport::new(config.api_base.clone()));
    let uploaded = transport.upload(bytes, &file_name, mime_for(path)?).await?;
    info!(
        "🖼️ Uploaded {} ({}, {}x{})",
        uploaded.original_name,
        format_file_size(uploaded.size),
        uploaded.width.unwrap_or_default(),
        uploaded.height.unwrap_or_default()
    );

    let mut request = GenerationRequest::new(uploaded.data_url, prompt, style);
    if let Some(c) = env_percent("STUDIO_CREATIVITY")? { request.creativity = c; }
    if let Some(s) = env_percent("STUDIO_STRENGTH")? { request.strength = s; }
    let problems = request.validate();
    if !problems.is_empty() {
        return Err(anyhow!(problems.join("; ")));
    }
    info!("📝 {}", request.summary());

    let mut history = HistoryStore::load(KvFile::new(&config.history_path), config.history_cap);
    let controller = GenerationController::new(transport, config.retry.clone());
    let mut events = controller.events();
    controller.generate(request);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.abort();
                break;
            }
            event = events.recv() => match event {
                Ok(ControllerEvent::RetryScheduled { attempt, max_attempts, delay }) => {
                    warn!("⏳ Retrying in {}s, attempt {}/{}", delay.as_secs_f64(), attempt + 1, max_attempts);
                }
                Ok(ControllerEvent::Completed(generation)) => {
                    info!("✨ {} -> {}", generation.id, generation.image_url);
                    history.add(generation)?;
                    break;
                }
                Ok(ControllerEvent::Failed(message)) => {
                    error!("Generation failed after {} attempts: {}", controller.policy().max_attempts, message);
                    if manual_retries == 0 {
                        break;
                    }
                    manual_retries -= 1;
                    info!("🔁 Retrying manually");
                    controller.retry();
                }
                Ok(ControllerEvent::Cancelled) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("Missed {} controller events", n),
                Err(RecvError::Closed) => break,
            }
        }
    }

    let status = controller.status();
    if let Some(err) = &status.error {
        error!("Last error: {}", err);
    }

    println!("Recent generations ({}):", history.items().len());
    for item in history.items() {
        println!(
            "  {}  {:<10}  {}  {}",
            item.created_at.format("%Y-%m-%d %H:%M:%S"),
            item.style.label(),
            item.id,
            item.prompt
        );
    }
    Ok(())
}
