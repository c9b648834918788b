//! Runs the refund scenario through the full service and prints the result as
//! JSON, followed by the Prometheus exposition.

use std::sync::Arc;

use atlas_trust::telemetry::init_tracing;
use atlas_trust::{
    CallerContext, EngineConfig, EvaluationInput, HashedBagProvider, MemoryStore, TrustService,
    WeightRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let prom = atlas_trust::metrics::install_prometheus()?;

    let config = EngineConfig::from_env()?;
    let registry = Arc::new(WeightRegistry::new());
    if let Ok(path) = std::env::var("TRUST_WEIGHTS_PATH") {
        registry.load_profiles_file(&path)?;
    }

    let service = TrustService::from_config(
        &config,
        Arc::new(HashedBagProvider::default()),
        Some(Arc::new(MemoryStore::new())),
        registry,
    )?;

    let input = EvaluationInput::new(
        vec!["Refunds are allowed within 30 days.".to_string()],
        "Yes, refunds are allowed up to 120 days.",
        "Can I get a refund after 90 days?",
    );
    let caller = CallerContext::new("demo-key").tenant("demo");

    let result = service.evaluate(&caller, &input).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    // second run is served from the embedding cache
    let _ = service.evaluate(&caller, &input).await?;
    println!("{}", prom.render());
    Ok(())
}
