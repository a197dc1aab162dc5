use anyhow::Context;
use chrono::Utc;
use rollup_store::{
    BackendKind, ConnectionPool, PurgeScheduler, StorageConfig, StorageEngine,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rollup_store::init_tracing();

    println!("=== Sample Ingestion Example ===\n");

    // Optional YAML config as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => StorageConfig::from_yaml_file(&path)
            .with_context(|| format!("loading {}", path))?,
        None => StorageConfig::default(),
    };
    println!("Driver: {:?}, index: {:?}", config.backend, config.index);

    let engine = Arc::new(StorageEngine::connect(&config).await?);

    if config.backend == BackendKind::Postgres {
        let pool = Arc::new(ConnectionPool::new(&config.database).await?);
        tokio::spawn(PurgeScheduler::new(pool, 3600).start());
        println!("Purge scheduler started (hourly)");
    }

    // 1. Single sample
    let now = Utc::now().timestamp() as u32;
    println!("\n1. Writing one sample...");
    let mut sample = engine.acquire_sample();
    sample.fill("servers.web1.cpu", 42.5, now);
    let report = engine.set(&sample).await?;
    engine.release_sample(sample);
    println!("   {}/{} tiers written", report.written, report.buckets);

    // 2. A minute of samples for a few hosts, written concurrently
    println!("\n2. Writing 60s of samples for 3 hosts...");
    let mut handles = Vec::new();
    for host in ["web1", "web2", "db1"] {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let mut written = 0;
            for offset in 0..60u32 {
                let mut sample = engine.acquire_sample();
                sample.fill(
                    &format!("servers.{}.requests", host),
                    (offset % 7) as f64,
                    now - 60 + offset,
                );
                let report = engine.set(&sample).await?;
                engine.release_sample(sample);
                written += report.written;
            }
            anyhow::Ok(written)
        }));
    }
    let mut total = 0;
    for handle in handles {
        total += handle.await??;
    }
    println!("   {} tier writes", total);

    // 3. Browse the name index
    println!("\n3. Known hosts:");
    for node in engine.index().get_children("servers").await? {
        println!("   {}", node.key);
    }

    let health = engine.health().await;
    println!("\nHealth: driver={} index={}", health.driver, health.index);

    engine.close().await;
    println!("\n=== Example completed successfully ===");
    Ok(())
}
