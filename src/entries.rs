use crate::record::Field;
use serde::Serialize;
use serde_json::Value;

/// Title used for episodes whose show is missing.
pub const UNKNOWN_SHOW: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Movie,
    Episode,
    ShowGroup,
    Show,
}

/// Which timestamp an episode-bearing slot contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeContext {
    /// `progress` and `paused_at` from playback records.
    InProgress,
    /// `watched_at` from history records.
    Watched,
    /// `first_aired` from calendar records, exposed as `airs_at`.
    Airing,
}

/// Which timestamp a movie slot contributes, and where the movie object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieContext {
    InProgress,
    Watched,
    Released,
    /// Recommendation records are the movie object itself and carry no timestamp.
    Recommended,
}

impl MovieContext {
    /// The object holding `title`, `year`, `ids` and `rating`.
    pub fn movie<'a>(self, record: &'a Value) -> Field<'a> {
        match self {
            MovieContext::Recommended => Field::of(record),
            _ => Field::of(record).get("movie"),
        }
    }
}

/// Context timestamps. Present values pass through as they arrived; absent ones are
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Timing {
    InProgress {
        progress: Option<Value>,
        paused_at: Option<Value>,
    },
    Watched {
        watched_at: Option<Value>,
    },
    Airing {
        airs_at: Option<Value>,
    },
    Released {
        released: Option<Value>,
    },
}

impl Timing {
    fn for_episode(context: EpisodeContext, record: Field<'_>) -> Self {
        match context {
            EpisodeContext::InProgress => Timing::in_progress(record),
            EpisodeContext::Watched => Timing::Watched {
                watched_at: record.get("watched_at").cloned(),
            },
            EpisodeContext::Airing => Timing::Airing {
                airs_at: record.get("first_aired").cloned(),
            },
        }
    }

    fn for_movie(context: MovieContext, record: Field<'_>) -> Option<Self> {
        match context {
            MovieContext::InProgress => Some(Timing::in_progress(record)),
            MovieContext::Watched => Some(Timing::Watched {
                watched_at: record.get("watched_at").cloned(),
            }),
            MovieContext::Released => Some(Timing::Released {
                released: record.get("released").cloned(),
            }),
            MovieContext::Recommended => None,
        }
    }

    fn in_progress(record: Field<'_>) -> Self {
        Timing::InProgress {
            progress: record.get("progress").cloned(),
            paused_at: record.get("paused_at").cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub season: Option<Value>,
    pub number: Option<Value>,
    pub title: Option<Value>,
    #[serde(flatten)]
    pub timing: Timing,
}

impl EpisodeEntry {
    pub fn from_record(record: &Value, context: EpisodeContext) -> Self {
        let record = Field::of(record);
        let episode = record.get("episode");
        EpisodeEntry {
            kind: EntryKind::Episode,
            season: episode.get("season").cloned(),
            number: episode.get("number").cloned(),
            title: episode.get("title").cloned(),
            timing: Timing::for_episode(context, record),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowGroup {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub title: Value,
    pub tmdb_id: Option<Value>,
    pub episodes: Vec<EpisodeEntry>,
}

impl ShowGroup {
    /// Empty group for the show of `record`.
    pub fn for_record(record: &Value) -> Self {
        let show = Field::of(record).get("show");
        ShowGroup {
            kind: EntryKind::ShowGroup,
            title: show
                .get("title")
                .cloned()
                .unwrap_or_else(|| Value::from(UNKNOWN_SHOW)),
            tmdb_id: show.path(&["ids", "tmdb"]).cloned(),
            episodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub title: Option<Value>,
    pub year: Option<Value>,
    pub rating: Option<f64>,
    pub tmdb_id: Option<Value>,
    #[serde(flatten)]
    pub timing: Option<Timing>,
}

impl MovieEntry {
    pub fn from_record(record: &Value, context: MovieContext) -> Self {
        let movie = context.movie(record);
        MovieEntry {
            kind: EntryKind::Movie,
            title: movie.get("title").cloned(),
            year: movie.get("year").cloned(),
            rating: normalize_rating(movie.get("rating")),
            tmdb_id: movie.path(&["ids", "tmdb"]).cloned(),
            timing: Timing::for_movie(context, Field::of(record)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub title: Option<Value>,
    pub year: Option<Value>,
    pub rating: Option<f64>,
    pub tmdb_id: Option<Value>,
    pub network: Option<Value>,
}

impl ShowEntry {
    pub fn from_record(record: &Value) -> Self {
        let show = Field::of(record);
        ShowEntry {
            kind: EntryKind::Show,
            title: show.get("title").cloned(),
            year: show.get("year").cloned(),
            rating: normalize_rating(show.get("rating")),
            tmdb_id: show.path(&["ids", "tmdb"]).cloned(),
            network: show.get("network").cloned(),
        }
    }
}

/// One item of an output list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entry {
    Group(ShowGroup),
    Movie(MovieEntry),
    Show(ShowEntry),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Group(g) => g.kind,
            Entry::Movie(m) => m.kind,
            Entry::Show(s) => s.kind,
        }
    }
}

impl From<ShowGroup> for Entry {
    fn from(group: ShowGroup) -> Self {
        Entry::Group(group)
    }
}

impl From<MovieEntry> for Entry {
    fn from(movie: MovieEntry) -> Self {
        Entry::Movie(movie)
    }
}

impl From<ShowEntry> for Entry {
    fn from(show: ShowEntry) -> Self {
        Entry::Show(show)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counts {
    pub continue_watching: usize,
    pub recently_watched: usize,
    pub upcoming: usize,
    pub recommended: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputDocument {
    pub image_base_url: String,
    pub continue_watching: Vec<Entry>,
    pub recently_watched: Vec<Entry>,
    pub upcoming: Vec<Entry>,
    pub recommended: Vec<Entry>,
    pub fetched_at: String,
    pub has_content: bool,
    pub counts: Counts,
}

/// Rounds to one decimal, half away from zero. Non-numeric ratings are absent.
pub fn normalize_rating(rating: Field<'_>) -> Option<f64> {
    rating.as_f64().map(|r| (r * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rounds_ratings_to_one_decimal() {
        let v = json!({ "a": 7.83, "b": 7.85, "c": 8, "d": "7.5", "e": null });
        let f = Field::of(&v);
        assert_eq!(normalize_rating(f.get("a")), Some(7.8));
        assert_eq!(normalize_rating(f.get("b")), Some(7.9));
        assert_eq!(normalize_rating(f.get("c")), Some(8.0));
        assert_eq!(normalize_rating(f.get("d")), None);
        assert_eq!(normalize_rating(f.get("e")), None);
        assert_eq!(normalize_rating(f.get("missing")), None);
    }

    #[test]
    fn episode_entry_carries_context_timestamp() {
        let record = json!({
            "progress": 41.5,
            "paused_at": "2024-05-01T20:00:00.000Z",
            "watched_at": "ignored",
            "episode": { "season": 1, "number": 3, "title": "Pilot" },
            "show": { "title": "Shogun" }
        });
        let entry = EpisodeEntry::from_record(&record, EpisodeContext::InProgress);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "type": "episode",
                "season": 1,
                "number": 3,
                "title": "Pilot",
                "progress": 41.5,
                "paused_at": "2024-05-01T20:00:00.000Z"
            })
        );
    }

    #[test]
    fn airing_episode_exposes_first_aired_as_airs_at() {
        let record = json!({ "first_aired": "2024-06-01T01:00:00.000Z", "episode": {} });
        let entry = EpisodeEntry::from_record(&record, EpisodeContext::Airing);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["airs_at"], json!("2024-06-01T01:00:00.000Z"));
        assert_eq!(value["season"], Value::Null);
        assert!(value.get("first_aired").is_none());
    }

    #[test]
    fn recommended_movie_reads_the_record_itself() {
        let record = json!({
            "title": "Heat", "year": 1995, "rating": 8.26, "ids": { "tmdb": 949 }
        });
        let entry = MovieEntry::from_record(&record, MovieContext::Recommended);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({ "type": "movie", "title": "Heat", "year": 1995, "rating": 8.3, "tmdb_id": 949 })
        );
    }

    #[test]
    fn present_values_of_unexpected_type_pass_through() {
        let record = json!({ "title": "Heat", "year": "1995", "ids": { "tmdb": "949" } });
        let value =
            serde_json::to_value(MovieEntry::from_record(&record, MovieContext::Recommended))
                .unwrap();
        assert_eq!(value["year"], json!("1995"));
        assert_eq!(value["tmdb_id"], json!("949"));

        let record = json!({
            "paused_at": 1714593600,
            "show": { "title": 1899, "ids": { "tmdb": 90669 } },
            "episode": { "season": "1", "number": 2.0 }
        });
        let group = ShowGroup::for_record(&record);
        assert_eq!(group.title, json!(1899));
        assert_eq!(group.tmdb_id, Some(json!(90669)));
        let episode =
            serde_json::to_value(EpisodeEntry::from_record(&record, EpisodeContext::InProgress))
                .unwrap();
        assert_eq!(episode["season"], json!("1"));
        assert_eq!(episode["number"], json!(2.0));
        assert_eq!(episode["paused_at"], json!(1714593600));
        assert_eq!(episode["progress"], Value::Null);
    }

    #[test]
    fn watched_movie_with_missing_fields_serializes_nulls() {
        let record = json!({ "watched_at": "2024-01-01T00:00:00.000Z" });
        let entry = MovieEntry::from_record(&record, MovieContext::Watched);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "type": "movie",
                "title": null,
                "year": null,
                "rating": null,
                "tmdb_id": null,
                "watched_at": "2024-01-01T00:00:00.000Z"
            })
        );
    }

    #[test]
    fn show_entry_and_group_tags() {
        let show = ShowEntry::from_record(&json!({ "title": "Dark", "network": "Netflix" }));
        assert_eq!(Entry::from(show.clone()).kind(), EntryKind::Show);
        assert_eq!(serde_json::to_value(&show).unwrap()["type"], json!("show"));

        let group = ShowGroup::for_record(&json!({ "episode": { "season": 1 } }));
        assert_eq!(group.title, UNKNOWN_SHOW);
        assert_eq!(serde_json::to_value(&group).unwrap()["type"], json!("show_group"));
    }
}
