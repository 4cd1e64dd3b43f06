// SPDX-License-Identifier: MIT

//! Binary checkpoint codec
//!
//! MessagePack with named fields. Dates, raw bytes and nested collections
//! decode to exactly what was encoded, which plain JSON cannot promise.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::adk::error::CheckpointError;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CheckpointError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CheckpointError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::weft::checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource};
    use crate::weft::state::{PartialState, StateValue, WorkflowState};

    fn sample_state() -> WorkflowState {
        let when = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap()
            + chrono::Duration::microseconds(123_456);
        [
            ("when".to_string(), StateValue::DateTime(when)),
            ("blob".to_string(), StateValue::bytes(vec![0u8, 159, 255])),
            ("ratio".to_string(), StateValue::Float(0.1)),
            ("missing".to_string(), StateValue::Null),
            (
                "messages".to_string(),
                StateValue::from(json!([{"role": "user", "content": "hi"}, [1, [2, 3]]])),
            ),
            (
                "nested".to_string(),
                StateValue::List(vec![StateValue::DateTime(when), StateValue::Bool(true)]),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_state_round_trip() {
        let state = sample_state();
        let decoded: WorkflowState = decode(&encode(&state).unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_checkpoint_and_metadata_round_trip() {
        let mut cp = Checkpoint::child_of(None, sample_state());
        cp.next = vec!["action".to_string()];
        cp.pending_joins.insert(
            "join".to_string(),
            BTreeSet::from(["left".to_string(), "right".to_string()]),
        );
        let meta = CheckpointMetadata {
            source: CheckpointSource::Input,
            step: -1,
            writes: BTreeMap::from([(
                "__start__".to_string(),
                PartialState::new().with("query", "hello"),
            )]),
            extra: BTreeMap::from([("user".to_string(), StateValue::from("sam"))]),
        };

        let cp2: Checkpoint = decode(&encode(&cp).unwrap()).unwrap();
        let meta2: CheckpointMetadata = decode(&encode(&meta).unwrap()).unwrap();
        assert_eq!(cp2, cp);
        assert_eq!(meta2, meta);
    }

    #[test]
    fn test_garbage_is_codec_error() {
        let err = decode::<Checkpoint>(&[0xc1, 0x00]).unwrap_err();
        assert!(matches!(err, CheckpointError::Codec(_)));
    }
}
