//! First-seen grouping and deduplication over one source batch.
use crate::entries::{EpisodeContext, EpisodeEntry, ShowGroup};
use crate::keys::{episode_key, group_key};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

/// Groups episode records under their show.
///
/// A repeated show+season+episode is skipped wherever it appears in the batch. Groups
/// keep the order in which each show first contributed an episode.
pub fn group_episodes(batch: &[Value], context: EpisodeContext) -> Vec<ShowGroup> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut groups: IndexMap<String, ShowGroup> = IndexMap::new();

    for record in batch {
        if !seen.insert(episode_key(record)) {
            continue;
        }
        groups
            .entry(group_key(record))
            .or_insert_with(|| ShowGroup::for_record(record))
            .episodes
            .push(EpisodeEntry::from_record(record, context));
    }

    groups.into_values().collect()
}

/// Keeps the first record for each key, mapped through `map`.
pub fn dedup_by_key<T, K, M>(batch: &[Value], key: K, map: M) -> Vec<T>
where
    K: Fn(&Value) -> String,
    M: Fn(&Value) -> T,
{
    let mut kept: IndexMap<String, T> = IndexMap::new();
    for record in batch {
        kept.entry(key(record)).or_insert_with(|| map(record));
    }
    kept.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::Timing;
    use serde_json::json;

    fn watched(show: &str, season: i64, number: i64, at: &str) -> Value {
        json!({
            "watched_at": at,
            "show": { "title": show, "ids": { "tmdb": 10 } },
            "episode": { "season": season, "number": number, "title": format!("E{}", number) }
        })
    }

    #[test]
    fn groups_by_show_and_drops_repeated_episodes() {
        let batch = vec![
            watched("X", 1, 1, "first"),
            watched("X", 1, 1, "second"),
            watched("X", 1, 2, "third"),
        ];
        let groups = group_episodes(&batch, EpisodeContext::Watched);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, "X");
        assert_eq!(groups[0].tmdb_id, Some(json!(10)));
        assert_eq!(groups[0].episodes.len(), 2);
        assert_eq!(
            groups[0].episodes[0].timing,
            Timing::Watched {
                watched_at: Some(json!("first"))
            }
        );
        assert_eq!(groups[0].episodes[1].number, Some(json!(2)));
    }

    #[test]
    fn group_order_follows_first_appearance() {
        let batch = vec![
            watched("B", 1, 1, "t1"),
            watched("A", 1, 1, "t2"),
            watched("B", 1, 2, "t3"),
        ];
        let titles: Vec<_> = group_episodes(&batch, EpisodeContext::Watched)
            .into_iter()
            .map(|g| (g.title, g.episodes.len()))
            .collect();
        assert_eq!(titles, vec![(json!("B"), 2), (json!("A"), 1)]);
    }

    #[test]
    fn showless_episodes_land_in_unknown() {
        let batch = vec![
            json!({ "episode": { "season": 1, "number": 1 } }),
            json!({ "episode": { "season": 1, "number": 2 } }),
            json!("not even an object"),
        ];
        let groups = group_episodes(&batch, EpisodeContext::Airing);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, "Unknown");
        assert_eq!(groups[0].tmdb_id, None);
        assert_eq!(groups[0].episodes.len(), 3);
    }

    #[test]
    fn whole_float_and_integer_seasons_collapse() {
        let batch = vec![
            json!({ "watched_at": "c", "show": { "title": "Z" },
                    "episode": { "season": 1.0, "number": 2 } }),
            json!({ "watched_at": "d", "show": { "title": "Z" },
                    "episode": { "season": 1, "number": 2 } }),
        ];
        let groups = group_episodes(&batch, EpisodeContext::Watched);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].episodes.len(), 1);
        assert_eq!(
            groups[0].episodes[0].timing,
            Timing::Watched {
                watched_at: Some(json!("c"))
            }
        );
    }

    #[test]
    fn numeric_show_titles_form_separate_groups() {
        let batch = vec![
            json!({ "show": { "title": 1899, "ids": { "tmdb": 90669 } },
                    "episode": { "season": 1, "number": 1 } }),
            json!({ "show": { "title": 24, "ids": { "tmdb": 1973 } },
                    "episode": { "season": 1, "number": 1 } }),
        ];
        let groups = group_episodes(&batch, EpisodeContext::Watched);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, json!(1899));
        assert_eq!(groups[0].tmdb_id, Some(json!(90669)));
        assert_eq!(groups[1].title, json!(24));
        assert_eq!(groups[1].tmdb_id, Some(json!(1973)));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let batch = vec![
            json!({ "title": "A", "v": 1 }),
            json!({ "title": "B", "v": 2 }),
            json!({ "title": "A", "v": 3 }),
        ];
        let kept = dedup_by_key(
            &batch,
            |r| r["title"].as_str().unwrap_or_default().to_string(),
            |r| r["v"].as_i64().unwrap_or_default(),
        );
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn empty_batches_produce_nothing() {
        assert!(group_episodes(&[], EpisodeContext::InProgress).is_empty());
        let kept: Vec<i64> = dedup_by_key(&[], |_| String::new(), |_| 0);
        assert!(kept.is_empty());
    }
}
