use crate::entries::{
    Counts, Entry, EpisodeContext, MovieContext, MovieEntry, OutputDocument, ShowEntry,
};
use crate::group::{dedup_by_key, group_episodes};
use crate::keys::{movie_key, show_key};
use crate::slots::{Slot, Slots};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_IMAGE_BASE_URL: &str = "http://localhost:5000";

pub const CONTINUE_WATCHING_CAP: usize = 5;
pub const RECENTLY_WATCHED_CAP: usize = 10;
pub const UPCOMING_CAP: usize = 10;
pub const RECOMMENDED_CAP: usize = 10;

#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub image_base_url: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
        }
    }
}

pub fn transform(payload: &Value) -> OutputDocument {
    transform_with(payload, &TransformOptions::default(), Utc::now())
}

/// Parses and transforms a raw payload. Unparseable text yields an empty document.
pub fn transform_str(raw: &str, options: &TransformOptions) -> OutputDocument {
    let payload = match serde_json::from_str::<Value>(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("Payload is not valid JSON, producing empty output: {}", e);
            Value::Null
        }
    };
    transform_with(&payload, options, Utc::now())
}

pub fn transform_with(
    payload: &Value,
    options: &TransformOptions,
    fetched_at: DateTime<Utc>,
) -> OutputDocument {
    let slots = Slots::read(payload);

    let continue_watching = section(
        episodes(&slots, Slot::InProgressEpisodes, EpisodeContext::InProgress),
        movies(&slots, Slot::InProgressMovies, MovieContext::InProgress),
        CONTINUE_WATCHING_CAP,
    );
    let recently_watched = section(
        episodes(&slots, Slot::WatchedEpisodes, EpisodeContext::Watched),
        movies(&slots, Slot::WatchedMovies, MovieContext::Watched),
        RECENTLY_WATCHED_CAP,
    );
    let upcoming = section(
        episodes(&slots, Slot::UpcomingEpisodes, EpisodeContext::Airing),
        movies(&slots, Slot::UpcomingMovies, MovieContext::Released),
        UPCOMING_CAP,
    );
    let recommended = section(
        shows(&slots, Slot::RecommendedShows),
        movies(&slots, Slot::RecommendedMovies, MovieContext::Recommended),
        RECOMMENDED_CAP,
    );

    let counts = Counts {
        continue_watching: continue_watching.len(),
        recently_watched: recently_watched.len(),
        upcoming: upcoming.len(),
        recommended: recommended.len(),
    };
    let has_content = counts.continue_watching > 0
        || counts.recently_watched > 0
        || counts.upcoming > 0
        || counts.recommended > 0;

    debug!(
        records = slots.total_records(),
        continue_watching = counts.continue_watching,
        recently_watched = counts.recently_watched,
        upcoming = counts.upcoming,
        recommended = counts.recommended,
        "Transformed payload"
    );

    OutputDocument {
        image_base_url: options.image_base_url.clone(),
        continue_watching,
        recently_watched,
        upcoming,
        recommended,
        fetched_at: fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        has_content,
        counts,
    }
}

fn section(first: Vec<Entry>, second: Vec<Entry>, cap: usize) -> Vec<Entry> {
    first.into_iter().chain(second).take(cap).collect()
}

fn episodes(slots: &Slots<'_>, slot: Slot, context: EpisodeContext) -> Vec<Entry> {
    group_episodes(slots.batch(slot), context)
        .into_iter()
        .map(Entry::from)
        .collect()
}

fn movies(slots: &Slots<'_>, slot: Slot, context: MovieContext) -> Vec<Entry> {
    dedup_by_key(
        slots.batch(slot),
        |record| movie_key(context.movie(record)),
        |record| Entry::from(MovieEntry::from_record(record, context)),
    )
}

fn shows(slots: &Slots<'_>, slot: Slot) -> Vec<Entry> {
    dedup_by_key(slots.batch(slot), show_key, |record| {
        Entry::from(ShowEntry::from_record(record))
    })
}
