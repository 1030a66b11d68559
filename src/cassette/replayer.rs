//! Replays recorded calls from a cassette, strictly in recorded order.

use serde::de::DeserializeOwned;

use super::format::{Call, Cassette, Interaction};

/// Serves recorded outcomes one call at a time.
pub struct CassetteReplayer {
    interactions: Vec<Interaction>,
    cursor: usize,
}

impl CassetteReplayer {
    /// Create a replayer positioned at the first recorded call.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut interactions = cassette.interactions.clone();
        interactions.sort_by_key(|i| i.seq);
        Self { interactions, cursor: 0 }
    }

    /// Consume the next interaction, which must be for the same method as `call`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette is exhausted or the next recorded
    /// call is for a different method.
    pub fn next_interaction(&mut self, call: &Call) -> Result<&Interaction, String> {
        let Some(interaction) = self.interactions.get(self.cursor) else {
            return Err(format!(
                "cassette exhausted: all {} recorded calls consumed, got {}",
                self.interactions.len(),
                call.method()
            ));
        };
        if interaction.call.method() != call.method() {
            return Err(format!(
                "out of order call: expected {} (seq {}), got {}",
                interaction.call.method(),
                interaction.seq,
                call.method()
            ));
        }
        self.cursor += 1;
        Ok(interaction)
    }

    /// Replay the next outcome for `call`.
    ///
    /// The outer result reports cassette problems; the inner one is the
    /// recorded outcome. An absent success value deserializes from `null`,
    /// which covers unit results.
    ///
    /// # Errors
    ///
    /// Returns an error on a mismatch or an unreadable recorded value.
    pub fn replay<T: DeserializeOwned>(&mut self, call: &Call) -> Result<Result<T, String>, String> {
        let outcome = self.next_interaction(call)?.outcome.clone();
        if let Some(err) = outcome.err {
            return Ok(Err(err));
        }
        serde_json::from_value(outcome.ok.unwrap_or(serde_json::Value::Null))
            .map(Ok)
            .map_err(|e| format!("unreadable recorded {} outcome: {e}", call.method()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Outcome;
    use chrono::Utc;
    use serde_json::json;

    fn make_cassette(interactions: Vec<Interaction>) -> Cassette {
        Cassette { name: "test".into(), recorded_at: Utc::now(), commit: "abc".into(), interactions }
    }

    fn load(seq: u64, err: Option<&str>) -> Interaction {
        Interaction {
            seq,
            call: Call::LoadAdapter { adapter: "someone/style".into() },
            outcome: Outcome { ok: None, err: err.map(str::to_string) },
        }
    }

    #[test]
    fn replays_in_seq_order() {
        let cassette = make_cassette(vec![
            Interaction { seq: 1, call: Call::UnloadAdapter, outcome: Outcome::default() },
            load(0, None),
        ]);
        let mut replayer = CassetteReplayer::new(&cassette);

        let load_call = Call::LoadAdapter { adapter: "anything".into() };
        assert_eq!(replayer.next_interaction(&load_call).unwrap().seq, 0);
        assert_eq!(replayer.next_interaction(&Call::UnloadAdapter).unwrap().seq, 1);
    }

    #[test]
    fn recorded_error_is_replayed() {
        let cassette = make_cassette(vec![load(0, Some("not found"))]);
        let mut replayer = CassetteReplayer::new(&cassette);
        let result = replayer.replay::<()>(&Call::LoadAdapter { adapter: "someone/style".into() });
        assert_eq!(result.unwrap().unwrap_err(), "not found");
    }

    #[test]
    fn unit_outcome_from_missing_value() {
        let cassette = make_cassette(vec![load(0, None)]);
        let mut replayer = CassetteReplayer::new(&cassette);
        let result = replayer.replay::<()>(&Call::LoadAdapter { adapter: "someone/style".into() });
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test]
    fn typed_outcome() {
        let cassette = make_cassette(vec![Interaction {
            seq: 0,
            call: Call::UnloadAdapter,
            outcome: Outcome { ok: Some(json!(7)), err: None },
        }]);
        let mut replayer = CassetteReplayer::new(&cassette);
        assert_eq!(replayer.replay::<u32>(&Call::UnloadAdapter), Ok(Ok(7)));
    }

    #[test]
    fn out_of_order_call_is_rejected() {
        let cassette = make_cassette(vec![load(0, None)]);
        let mut replayer = CassetteReplayer::new(&cassette);
        let err = replayer.next_interaction(&Call::UnloadAdapter).unwrap_err();
        assert!(err.contains("out of order"));
    }

    #[test]
    fn exhausted_cassette_is_rejected() {
        let cassette = make_cassette(vec![]);
        let mut replayer = CassetteReplayer::new(&cassette);
        let err = replayer.next_interaction(&Call::UnloadAdapter).unwrap_err();
        assert!(err.contains("cassette exhausted"));
    }
}
