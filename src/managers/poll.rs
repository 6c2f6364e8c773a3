use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::error;

/// Base for the closed-poll sort transform. A closed poll sorts by
/// `CLOSED_SORT_BASE - end_time`, which places it after every ongoing poll
/// that ends before roughly year 33658 and orders closed polls most
/// recently closed first. Timestamps past that horizon break the ordering.
pub const CLOSED_SORT_BASE: f64 = 1e15;

// Types

/// A question with options, a closing time, and the votes recorded so far.
///
/// `voters` and `options_voted` act as a map: `options_voted[i]` is the
/// option chosen by `voters[i]`. Voter names are unique within a poll and
/// keep their first-vote position when a vote is overwritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub question_name: String,
    pub end_time: f64,
    pub options: Vec<String>,
    pub voters: Vec<String>,
    pub options_voted: Vec<String>,
}

impl Poll {
    /// Structural validation of an untrusted decoded value into a `Poll`.
    ///
    /// Checks presence and element-wise types of the five fields, nothing
    /// more; uniqueness and referential checks belong to the service layer.
    pub fn parse(val: &Value) -> Option<Poll> {
        let record = match val.as_object() {
            Some(record) => record,
            None => {
                error!("poll value is not an object: {}", val);
                return None;
            }
        };
        let question_name = match record.get("questionName").and_then(Value::as_str) {
            Some(name) => name.to_owned(),
            None => {
                error!("poll questionName is missing or not a string");
                return None;
            }
        };
        let end_time = match record.get("endTime").and_then(Value::as_f64) {
            Some(end_time) => end_time,
            None => {
                error!("poll endTime is missing or not a number");
                return None;
            }
        };
        let options = parse_string_seq("options", record.get("options"))?;
        let voters = parse_string_seq("voters", record.get("voters"))?;
        let options_voted = parse_string_seq("optionsVoted", record.get("optionsVoted"))?;
        Some(Poll {
            question_name,
            end_time,
            options,
            voters,
            options_voted,
        })
    }

    pub fn is_ongoing(&self, now_ms: f64) -> bool {
        now_ms <= self.end_time
    }

    fn sort_key(&self, now_ms: f64) -> f64 {
        if self.is_ongoing(now_ms) {
            self.end_time
        } else {
            CLOSED_SORT_BASE - self.end_time
        }
    }

    /// Records `voter`'s choice, overwriting a previous vote in place.
    ///
    /// `option` must be one of the poll's options. After the mutation the
    /// voters/options_voted pair must still be of equal length.
    pub fn record_vote(&mut self, voter: &str, option: &str) -> Result<(), &'static str> {
        if !self.options.iter().any(|o| o == option) {
            return Err("The chosen option is not an option in the poll!");
        }
        match self.voters.iter().position(|v| v == voter) {
            Some(index) => match self.options_voted.get_mut(index) {
                Some(slot) => *slot = option.to_owned(),
                None => {
                    return Err(
                        "The voters and optionsVoted arrays are not of the same length! Invariant broken!",
                    )
                }
            },
            None => {
                self.voters.push(voter.to_owned());
                self.options_voted.push(option.to_owned());
            }
        }
        if self.voters.len() != self.options_voted.len() {
            return Err(
                "The voters and optionsVoted arrays are not of the same length! Invariant broken!",
            );
        }
        Ok(())
    }

    /// Vote count per option, in option order.
    pub fn tally(&self) -> Vec<(String, usize)> {
        self.options
            .iter()
            .map(|option| {
                let count = self.options_voted.iter().filter(|v| *v == option).count();
                (option.clone(), count)
            })
            .collect()
    }
}

fn parse_string_seq(field: &str, val: Option<&Value>) -> Option<Vec<String>> {
    let items = match val.and_then(Value::as_array) {
        Some(items) => items,
        None => {
            error!("poll {} is missing or not an array", field);
            return None;
        }
    };
    let mut strings = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(s) => strings.push(s.to_owned()),
            None => {
                error!("poll {} contains a non-string element", field);
                return None;
            }
        }
    }
    Some(strings)
}

// Store

/// The authoritative mapping from question name to poll.
#[derive(Default)]
pub struct PollStore {
    polls: HashMap<String, Poll>,
}

impl PollStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Poll> {
        self.polls.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Poll> {
        self.polls.get_mut(name)
    }

    /// Inserts the poll under its question name. Returns `false` without
    /// touching the store when the name is already taken, so the uniqueness
    /// check and the insert are a single step.
    pub fn insert(&mut self, poll: Poll) -> bool {
        match self.polls.entry(poll.question_name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(poll);
                true
            }
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &Poll> {
        self.polls.values()
    }

    /// Snapshot of all polls sorted ascending by the display key: ongoing
    /// polls by end time, then closed polls most recently closed first.
    pub fn sorted(&self, now_ms: f64) -> Vec<Poll> {
        let mut polls: Vec<Poll> = self.polls.values().cloned().collect();
        polls.sort_by(|a, b| {
            a.sort_key(now_ms)
                .partial_cmp(&b.sort_key(now_ms))
                .unwrap_or(Ordering::Equal)
        });
        polls
    }

    /// Empties the store. Reset utility, not part of the wire contract.
    pub fn clear(&mut self) {
        self.polls.clear();
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lunch_poll() -> Poll {
        Poll {
            question_name: "Lunch?".to_owned(),
            end_time: 1_060_000.0,
            options: vec!["Pizza".to_owned(), "Burger".to_owned()],
            voters: vec![],
            options_voted: vec![],
        }
    }

    #[test]
    fn parse_round_trips_serialized_poll() {
        let mut poll = lunch_poll();
        poll.record_vote("Ann", "Pizza").unwrap();

        let value = serde_json::to_value(&poll).unwrap();
        let parsed = Poll::parse(&value).expect("serialized poll should parse");
        assert_eq!(parsed, poll);
    }

    #[test]
    fn parse_rejects_malformed_values() {
        assert_eq!(Poll::parse(&json!("not a poll")), None);
        assert_eq!(Poll::parse(&json!({})), None);
        assert_eq!(
            Poll::parse(&json!({
                "questionName": 7,
                "endTime": 1.0,
                "options": [],
                "voters": [],
                "optionsVoted": [],
            })),
            None
        );
        assert_eq!(
            Poll::parse(&json!({
                "questionName": "Lunch?",
                "endTime": "soon",
                "options": [],
                "voters": [],
                "optionsVoted": [],
            })),
            None
        );
        assert_eq!(
            Poll::parse(&json!({
                "questionName": "Lunch?",
                "endTime": 1.0,
                "options": ["Pizza", 2],
                "voters": [],
                "optionsVoted": [],
            })),
            None
        );
        assert_eq!(
            Poll::parse(&json!({
                "questionName": "Lunch?",
                "endTime": 1.0,
                "options": [],
                "voters": "Ann",
                "optionsVoted": [],
            })),
            None
        );
        assert_eq!(
            Poll::parse(&json!({
                "questionName": "Lunch?",
                "endTime": 1.0,
                "options": [],
                "voters": [],
                "optionsVoted": [null],
            })),
            None
        );
    }

    #[test]
    fn record_vote_overwrites_existing_voter_in_place() {
        let mut poll = lunch_poll();
        poll.record_vote("Ann", "Pizza").unwrap();
        poll.record_vote("Bob", "Burger").unwrap();
        poll.record_vote("Ann", "Burger").unwrap();

        assert_eq!(poll.voters, vec!["Ann", "Bob"]);
        assert_eq!(poll.options_voted, vec!["Burger", "Burger"]);
        assert_eq!(poll.voters.len(), poll.options_voted.len());
    }

    #[test]
    fn record_vote_rejects_unknown_option() {
        let mut poll = lunch_poll();
        assert_eq!(
            poll.record_vote("Bob", "Taco"),
            Err("The chosen option is not an option in the poll!")
        );
        assert!(poll.voters.is_empty());
        assert!(poll.options_voted.is_empty());
    }

    #[test]
    fn record_vote_reports_desynced_vote_arrays() {
        let mut poll = lunch_poll();
        poll.voters.push("Ann".to_owned());
        assert_eq!(
            poll.record_vote("Ann", "Pizza"),
            Err("The voters and optionsVoted arrays are not of the same length! Invariant broken!")
        );
    }

    #[test]
    fn tally_counts_votes_per_option() {
        let mut poll = lunch_poll();
        poll.record_vote("Ann", "Pizza").unwrap();
        poll.record_vote("Bob", "Pizza").unwrap();
        poll.record_vote("Cam", "Burger").unwrap();

        assert_eq!(
            poll.tally(),
            vec![("Pizza".to_owned(), 2), ("Burger".to_owned(), 1)]
        );
    }

    #[test]
    fn insert_rejects_duplicate_question_name() {
        let mut store = PollStore::new();
        assert!(store.insert(lunch_poll()));

        let mut duplicate = lunch_poll();
        duplicate.end_time = 2_000_000.0;
        assert!(!store.insert(duplicate));

        assert_eq!(store.len(), 1);
        let kept = store.get("Lunch?").unwrap();
        assert_eq!(kept.end_time, 1_060_000.0);
    }

    #[test]
    fn sorted_puts_ongoing_before_closed() {
        let now = 1_000_000.0;
        let mut store = PollStore::new();
        for (name, end_time) in &[
            ("A", now + 60_000.0),
            ("B", now + 30_000.0),
            ("C", now - 60_000.0),
            ("D", now - 100_000.0),
        ] {
            store.insert(Poll {
                question_name: (*name).to_owned(),
                end_time: *end_time,
                options: vec![],
                voters: vec![],
                options_voted: vec![],
            });
        }

        let names: Vec<String> = store
            .sorted(now)
            .into_iter()
            .map(|p| p.question_name)
            .collect();
        // Ongoing polls by end time, then closed polls most recently closed first.
        assert_eq!(names, vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = PollStore::new();
        store.insert(lunch_poll());
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.values().count(), 0);
    }
}
