use clap::Args;
use cryptonews_core::{Sentiment, Stance};
use cryptonews_db::ItemRow;
use cryptonews_llm::LmStudioClient;
use cryptonews_pipeline::{semantic_search, PgItemStore, SearchFilters, SearchHit, DEFAULT_LIMIT};

/// Arguments for `search`.
#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Query text
    pub query: String,
    /// Comma-separated topics; items must share at least one
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,
    /// Restrict to the last N days
    #[arg(long)]
    pub days: Option<u32>,
    /// Filter by stance (bullish, bearish, neutral)
    #[arg(long)]
    pub stance: Option<Stance>,
    /// Filter by sentiment (-1, 0 or 1)
    #[arg(long, allow_negative_numbers = true, value_parser = clap::value_parser!(i8).range(-1..=1))]
    pub sentiment: Option<i8>,
    /// Maximum number of results
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,
}

impl SearchArgs {
    fn filters(&self) -> anyhow::Result<SearchFilters> {
        let sentiment = self
            .sentiment
            .map(Sentiment::try_from)
            .transpose()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let topics = self
            .topics
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Ok(SearchFilters {
            topics,
            sentiment,
            stance: self.stance,
            since_days: self.days,
        })
    }
}

/// Embed the query, score stored items against it and print the best hits.
///
/// # Errors
///
/// Returns an error if the model client cannot be built, the query cannot be
/// embedded, or the candidate query fails.
pub(crate) async fn run_search(
    pool: &sqlx::PgPool,
    config: &cryptonews_core::AppConfig,
    args: SearchArgs,
) -> anyhow::Result<()> {
    let filters = args.filters()?;
    let model = LmStudioClient::from_config(config)?;
    let store = PgItemStore::new(pool.clone());

    let hits = semantic_search(&store, &model, &args.query, &filters, args.limit).await?;
    if hits.is_empty() {
        println!("no matching items; run `ingest run` first or relax the filters");
        return Ok(());
    }
    for hit in &hits {
        print!("{}", render_hit(hit));
    }
    Ok(())
}

fn render_hit(hit: &SearchHit) -> String {
    let item = &hit.item;
    format!(
        "{}:{} score={:.3}\n{}\n{}\n-\n",
        item.source,
        item.external_id,
        hit.score,
        labels(item),
        item.text
    )
}

fn labels(item: &ItemRow) -> String {
    let sentiment = item
        .sentiment
        .map_or_else(|| "none".to_string(), |s| s.to_string());
    format!(
        "Topics: [{}] Sentiment: {} Stance: {}",
        item.topics.join(", "),
        sentiment,
        item.stance.as_deref().unwrap_or("none")
    )
}
