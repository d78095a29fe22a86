use crate::queue::{ReplyQueue, ReplyTask};
use crate::seen_set::SeenSet;
use crate::shutdown::Shutdown;
use birdwatch_core::{BotError, MonitoringConfig, Tweet};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use twitter_client::{CredentialCoordinator, Platform};

const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(15 * 60);
const ERROR_COOLDOWN: Duration = Duration::from_secs(60);
const MENTIONS_PAGE_SIZE: u32 = 10;
const SEARCH_PAGE_SIZE: u32 = 20;

/// Shared dependencies handed to every producer at construction time. The
/// seen-set and queue are the only mutable state producers touch.
#[derive(Clone)]
pub struct ProducerContext {
    pub gateway: Arc<dyn Platform>,
    pub auth: Arc<CredentialCoordinator>,
    pub seen: Arc<Mutex<SeenSet>>,
    pub queue: Arc<ReplyQueue>,
    pub config: MonitoringConfig,
    pub our_user_id: String,
}

impl ProducerContext {
    fn check_interval(&self) -> Duration {
        Duration::from_secs(self.config.check_interval_minutes * 60)
    }
}

/// Picks the next cooldown from a cycle outcome: normal interval on success,
/// a long cooldown when rate limited, a short one on any other error.
/// Producers never terminate on an error.
fn cycle_pause(ctx: &ProducerContext, producer: &str, outcome: Result<u32, BotError>) -> Duration {
    match outcome {
        Ok(enqueued) => {
            if enqueued > 0 {
                info!("{} producer enqueued {} new replies", producer, enqueued);
            }
            ctx.check_interval()
        }
        Err(e) if e.is_rate_limited() => {
            warn!("{} producer rate limited: {}", producer, e);
            RATE_LIMIT_COOLDOWN
        }
        Err(e) => {
            error!("Error in {} producer cycle: {}", producer, e);
            ERROR_COOLDOWN
        }
    }
}

async fn refresh_credentials(ctx: &ProducerContext) {
    if let Err(e) = ctx.auth.ensure_fresh().await {
        warn!(
            "Credential refresh failed, continuing with last snapshot: {}",
            e
        );
    }
}

pub async fn run_mentions_producer(ctx: ProducerContext, mut shutdown: Shutdown) {
    info!("Starting mentions producer");
    loop {
        if shutdown.is_triggered() {
            break;
        }
        let outcome = mentions_cycle(&ctx).await;
        let pause = cycle_pause(&ctx, "mentions", outcome);
        if !shutdown.idle(pause).await {
            break;
        }
    }
    info!("Mentions producer stopped");
}

pub async fn run_hashtags_producer(ctx: ProducerContext, mut shutdown: Shutdown) {
    info!("Starting hashtags producer");
    loop {
        if shutdown.is_triggered() {
            break;
        }
        let outcome = hashtags_cycle(&ctx).await;
        let pause = cycle_pause(&ctx, "hashtags", outcome);
        if !shutdown.idle(pause).await {
            break;
        }
    }
    info!("Hashtags producer stopped");
}

pub async fn run_keywords_producer(ctx: ProducerContext, mut shutdown: Shutdown) {
    info!("Starting keywords producer");
    let mut rotation = CategoryRotation::new(ctx.config.keywords.keys().cloned().collect());
    loop {
        if shutdown.is_triggered() {
            break;
        }
        let outcome = keywords_cycle(&ctx, &mut rotation).await;
        let pause = cycle_pause(&ctx, "keywords", outcome);
        if !shutdown.idle(pause).await {
            break;
        }
    }
    info!("Keywords producer stopped");
}

pub(crate) async fn mentions_cycle(ctx: &ProducerContext) -> Result<u32, BotError> {
    refresh_credentials(ctx).await;

    debug!("Checking for new mentions");
    let mentions = ctx
        .gateway
        .mentions(&ctx.our_user_id, MENTIONS_PAGE_SIZE)
        .await?;
    if mentions.is_empty() {
        debug!("No new mentions found");
        return Ok(0);
    }

    let mut enqueued = 0;
    for mention in &mentions {
        if ctx.seen.lock().unwrap().is_seen(&mention.id) {
            debug!("Skipping already processed mention: {}", mention.id);
            continue;
        }
        if mention.author_id == ctx.our_user_id {
            debug!("Skipping our own tweet: {}", mention.id);
            ctx.seen.lock().unwrap().mark_seen(mention.id.clone());
            continue;
        }

        // A failure while inspecting one mention skips only that mention;
        // it stays unseen and is retried next cycle.
        let is_reply_to_us = match references_our_tweet(ctx, mention).await {
            Ok(flag) => flag,
            Err(e) => {
                error!("Error processing mention {}: {}", mention.id, e);
                continue;
            }
        };

        enqueue_task(ctx, mention, 0, is_reply_to_us);
        enqueued += 1;
    }

    persist_seen(ctx);
    Ok(enqueued)
}

pub(crate) async fn hashtags_cycle(ctx: &ProducerContext) -> Result<u32, BotError> {
    refresh_credentials(ctx).await;

    let Some(query) = hashtag_query(&ctx.config) else {
        debug!("No hashtags configured, skipping cycle");
        return Ok(0);
    };
    info!("Searching for tweets with hashtags: {}", query);

    let tweets = ctx.gateway.search_recent(&query, SEARCH_PAGE_SIZE).await?;
    Ok(enqueue_search_results(
        ctx,
        &tweets,
        ctx.config.reply_delay_minutes as i64,
    ))
}

pub(crate) async fn keywords_cycle(
    ctx: &ProducerContext,
    rotation: &mut CategoryRotation,
) -> Result<u32, BotError> {
    refresh_credentials(ctx).await;

    let Some(category) = rotation.next_category() else {
        debug!("No keyword categories configured, skipping cycle");
        return Ok(0);
    };
    let Some(keywords) = ctx.config.keywords.get(&category) else {
        return Ok(0);
    };
    let query = keyword_query(keywords);
    info!(
        "Searching for tweets with keywords from category '{}': {}",
        category, query
    );

    let tweets = ctx.gateway.search_recent(&query, SEARCH_PAGE_SIZE).await?;
    Ok(enqueue_search_results(
        ctx,
        &tweets,
        ctx.config.reply_delay_minutes as i64,
    ))
}

/// Resolves whether a mention replies to one of our own tweets by following
/// its `replied_to` reference and comparing the parent author.
async fn references_our_tweet(ctx: &ProducerContext, mention: &Tweet) -> Result<bool, BotError> {
    let Some(parent_id) = mention.replied_to_id() else {
        return Ok(false);
    };
    let parent = ctx.gateway.tweet(parent_id).await?;
    if parent.author_id == ctx.our_user_id {
        info!("Found reply to our tweet: {}", mention.id);
        return Ok(true);
    }
    Ok(false)
}

/// Filters a search batch through the seen-set and enqueues the remainder.
/// Our own tweets are marked seen without enqueueing.
pub(crate) fn enqueue_search_results(
    ctx: &ProducerContext,
    tweets: &[Tweet],
    delay_minutes: i64,
) -> u32 {
    let mut enqueued = 0;
    for tweet in tweets {
        if ctx.seen.lock().unwrap().is_seen(&tweet.id) {
            debug!("Skipping already processed tweet: {}", tweet.id);
            continue;
        }
        if tweet.author_id == ctx.our_user_id {
            debug!("Skipping our own tweet: {}", tweet.id);
            ctx.seen.lock().unwrap().mark_seen(tweet.id.clone());
            continue;
        }
        enqueue_task(ctx, tweet, delay_minutes, false);
        enqueued += 1;
    }
    persist_seen(ctx);
    enqueued
}

fn enqueue_task(ctx: &ProducerContext, tweet: &Tweet, delay_minutes: i64, is_reply_to_us: bool) {
    info!(
        "Adding tweet {} to reply queue with {} minute delay",
        tweet.id, delay_minutes
    );
    ctx.queue.push(ReplyTask {
        tweet_id: tweet.id.clone(),
        author_id: tweet.author_id.clone(),
        text: tweet.text.clone(),
        created_at: tweet.created_at.unwrap_or_else(Utc::now),
        delay_minutes,
        is_reply_to_us,
    });
    ctx.seen.lock().unwrap().mark_seen(tweet.id.clone());
}

fn persist_seen(ctx: &ProducerContext) {
    let seen = ctx.seen.lock().unwrap();
    if let Err(e) = seen.persist() {
        error!("Error saving seen tweets: {}", e);
    }
}

/// OR-joined query over the configured hashtags, None when there are none.
pub fn hashtag_query(config: &MonitoringConfig) -> Option<String> {
    if config.hashtags.is_empty() {
        return None;
    }
    Some(config.hashtags.join(" OR "))
}

/// Quoted, OR-joined query over one category's keywords, restricted to
/// English results.
pub fn keyword_query(keywords: &[String]) -> String {
    let quoted: Vec<String> = keywords
        .iter()
        .map(|keyword| format!("\"{keyword}\""))
        .collect();
    format!("{} lang:en", quoted.join(" OR "))
}

/// Rotates through keyword categories so every category is sampled before
/// any repeats. Once all categories have been used the list resets and a
/// fresh round begins.
#[derive(Debug)]
pub struct CategoryRotation {
    categories: Vec<String>,
    used: Vec<String>,
}

impl CategoryRotation {
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            categories,
            used: Vec::new(),
        }
    }

    pub fn next_category(&mut self) -> Option<String> {
        if self.categories.is_empty() {
            return None;
        }
        if self.used.len() >= self.categories.len() {
            self.used.clear();
        }
        let remaining: Vec<&String> = self
            .categories
            .iter()
            .filter(|category| !self.used.contains(*category))
            .collect();
        let choice = remaining[fastrand::usize(..remaining.len())].clone();
        self.used.push(choice.clone());
        Some(choice)
    }
}
