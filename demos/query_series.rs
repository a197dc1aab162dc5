use anyhow::{bail, Context};
use chrono::Utc;
use rollup_store::{SeriesResponse, StorageConfig, StorageEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rollup_store::init_tracing();

    // query_series <glob> [seconds back] [config.yaml]
    let mut args = std::env::args().skip(1);
    let Some(target) = args.next() else {
        bail!("usage: query_series <glob> [seconds] [config.yaml]");
    };
    let window: u32 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("invalid window {:?}", s))?,
        None => 3600,
    };
    let config = match args.next() {
        Some(path) => StorageConfig::from_yaml_file(&path)?,
        None => StorageConfig::default(),
    };

    let engine = StorageEngine::connect(&config).await?;

    let to = Utc::now().timestamp() as u32;
    let from = to.saturating_sub(window);

    let leaves: Vec<_> = engine
        .index()
        .query(&target)
        .await?
        .into_iter()
        .filter(|node| node.leaf)
        .collect();
    if leaves.is_empty() {
        println!("No series match {}", target);
    }

    for node in leaves {
        let (range, series) = engine.get(&node.key, from, to).await?;
        let response = SeriesResponse::single(&node.key, &range, &series);
        println!("{}", response.to_json()?);
        engine.release_series(series);
    }

    engine.close().await;
    Ok(())
}
