use tracing_subscriber::EnvFilter;
use whats_that_bird::config::ChecklistConfig;
use whats_that_bird::services::checklist::{parse_checklist_html, write_csv};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = ChecklistConfig::from_env().expect("Failed to load configuration");

    if let Err(e) = refresh(&config).await {
        tracing::error!(error = %e, "Checklist refresh failed");
        std::process::exit(1);
    }
}

async fn refresh(config: &ChecklistConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(url = %config.checklist_url, "Fetching CBRC checklist");
    let html = reqwest::get(&config.checklist_url)
        .await?
        .error_for_status()?
        .text()
        .await?;

    let species = parse_checklist_html(&html)?;
    if species.is_empty() {
        return Err("checklist page contained no species entries".into());
    }

    tracing::info!(
        species = species.len(),
        path = %config.checklist_path,
        "Writing species checklist"
    );
    write_csv(&config.checklist_path, &species)?;

    Ok(())
}
