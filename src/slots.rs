use crate::record::Field;
use serde_json::Value;

/// The eight upstream queries, in index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    InProgressEpisodes,
    InProgressMovies,
    WatchedEpisodes,
    WatchedMovies,
    UpcomingEpisodes,
    UpcomingMovies,
    RecommendedShows,
    RecommendedMovies,
}

impl Slot {
    pub const ALL: [Slot; 8] = [
        Slot::InProgressEpisodes,
        Slot::InProgressMovies,
        Slot::WatchedEpisodes,
        Slot::WatchedMovies,
        Slot::UpcomingEpisodes,
        Slot::UpcomingMovies,
        Slot::RecommendedShows,
        Slot::RecommendedMovies,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of the slot in the incoming payload (`IDX_0` .. `IDX_7`).
    pub fn key(self) -> &'static str {
        match self {
            Slot::InProgressEpisodes => "IDX_0",
            Slot::InProgressMovies => "IDX_1",
            Slot::WatchedEpisodes => "IDX_2",
            Slot::WatchedMovies => "IDX_3",
            Slot::UpcomingEpisodes => "IDX_4",
            Slot::UpcomingMovies => "IDX_5",
            Slot::RecommendedShows => "IDX_6",
            Slot::RecommendedMovies => "IDX_7",
        }
    }
}

/// Borrowed view of one payload: one record list per slot.
#[derive(Debug, Clone, Copy)]
pub struct Slots<'a> {
    batches: [&'a [Value]; 8],
}

impl<'a> Slots<'a> {
    /// Reads every slot's `data` list; anything malformed reads as empty.
    pub fn read(payload: &'a Value) -> Self {
        let root = Field::of(payload);
        let mut batches: [&'a [Value]; 8] = [&[]; 8];
        for slot in Slot::ALL {
            batches[slot.index()] = root.path(&[slot.key(), "data"]).as_array();
        }
        Slots { batches }
    }

    pub fn batch(&self, slot: Slot) -> &'a [Value] {
        self.batches[slot.index()]
    }

    pub fn total_records(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slot_keys_follow_index_order() {
        for (i, slot) in Slot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
            assert_eq!(slot.key(), format!("IDX_{}", i));
        }
    }

    #[test]
    fn missing_and_malformed_slots_read_as_empty() {
        let payload = json!({
            "IDX_0": { "data": [{ "a": 1 }, { "a": 2 }] },
            "IDX_1": { "data": "nope" },
            "IDX_2": [1, 2, 3],
            "IDX_3": null
        });
        let slots = Slots::read(&payload);
        assert_eq!(slots.batch(Slot::InProgressEpisodes).len(), 2);
        assert!(slots.batch(Slot::InProgressMovies).is_empty());
        assert!(slots.batch(Slot::WatchedEpisodes).is_empty());
        assert!(slots.batch(Slot::WatchedMovies).is_empty());
        assert!(slots.batch(Slot::RecommendedMovies).is_empty());
        assert_eq!(slots.total_records(), 2);
    }

    #[test]
    fn non_object_payload_is_empty() {
        let payload = json!("garbage");
        assert_eq!(Slots::read(&payload).total_records(), 0);
    }
}
