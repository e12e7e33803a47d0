//! Dedup keys. These are deliberately loose: absent parts are rendered as text, so two
//! records missing the same fields collapse into one.
use crate::entries::UNKNOWN_SHOW;
use crate::record::Field;
use serde_json::Value;

/// `{title}-{year}` of the given movie object.
pub fn movie_key(movie: Field<'_>) -> String {
    format!(
        "{}-{}",
        movie.get("title").key_part(),
        movie.get("year").key_part()
    )
}

/// Movie key of a record carrying a nested `movie` object.
pub fn nested_movie_key(record: &Value) -> String {
    movie_key(Field::of(record).get("movie"))
}

/// Title of a recommendation record itself.
pub fn show_key(record: &Value) -> String {
    Field::of(record).get("title").key_part()
}

/// Show an episode record is grouped under; a missing title groups as `Unknown`.
pub fn group_key(record: &Value) -> String {
    let title = Field::of(record).path(&["show", "title"]);
    if title.is_present() {
        title.key_part()
    } else {
        UNKNOWN_SHOW.to_string()
    }
}

pub fn episode_key(record: &Value) -> String {
    let record = Field::of(record);
    format!(
        "{}-S{}E{}",
        record.path(&["show", "title"]).key_part(),
        record.path(&["episode", "season"]).key_part(),
        record.path(&["episode", "number"]).key_part()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn movie_key_joins_title_and_year() {
        let record = json!({ "movie": { "title": "Arrival", "year": 2016 } });
        assert_eq!(nested_movie_key(&record), "Arrival-2016");
    }

    #[test]
    fn movie_key_renders_missing_parts() {
        assert_eq!(nested_movie_key(&json!({})), "undefined-undefined");
        let flat = json!({ "title": "Arrival" });
        assert_eq!(movie_key(Field::of(&flat)), "Arrival-undefined");
    }

    #[test]
    fn show_key_uses_top_level_title() {
        let record = json!({ "title": "Andor", "show": { "title": "Other" } });
        assert_eq!(show_key(&record), "Andor");
    }

    #[test]
    fn episode_key_includes_show_season_and_number() {
        let record = json!({
            "show": { "title": "The Bear" },
            "episode": { "season": 2, "number": 7, "title": "Forks" }
        });
        assert_eq!(episode_key(&record), "The Bear-S2E7");
        assert_eq!(episode_key(&json!({})), "undefined-SundefinedEundefined");
    }

    #[test]
    fn whole_float_season_names_the_same_episode() {
        let float = json!({ "show": { "title": "Z" }, "episode": { "season": 1.0, "number": 2 } });
        let int = json!({ "show": { "title": "Z" }, "episode": { "season": 1, "number": 2 } });
        assert_eq!(episode_key(&float), "Z-S1E2");
        assert_eq!(episode_key(&float), episode_key(&int));
    }

    #[test]
    fn group_key_matches_title_text() {
        assert_eq!(group_key(&json!({ "show": { "title": 1899 } })), "1899");
        assert_eq!(group_key(&json!({ "show": { "title": 24 } })), "24");
        assert_eq!(group_key(&json!({ "show": { "title": null } })), "Unknown");
        assert_eq!(group_key(&json!({ "episode": {} })), "Unknown");
    }
}
