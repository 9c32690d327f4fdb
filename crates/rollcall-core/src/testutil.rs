//! Shared test doubles: an in-memory store and a scripted codec.

use crate::codec::{CodecError, FaceCodec};
use crate::store::{IdentityStore, StoreError};
use crate::types::{BoundingBox, Embedding, Frame, PersonRecord};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-memory `IdentityStore` with a switchable outage mode.
pub(crate) struct MemoryStore {
    rows: Mutex<HashMap<String, PersonRecord>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

impl IdentityStore for MemoryStore {
    fn load_enabled(&self) -> Result<Vec<PersonRecord>, StoreError> {
        self.check_up()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.enabled)
            .cloned()
            .collect())
    }

    fn fetch(&self, person_id: &str) -> Result<Option<PersonRecord>, StoreError> {
        self.check_up()?;
        Ok(self.rows.lock().unwrap().get(person_id).cloned())
    }

    fn upsert(&self, record: &PersonRecord) -> Result<(), StoreError> {
        self.check_up()?;
        self.rows
            .lock()
            .unwrap()
            .insert(record.person_id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, person_id: &str) -> Result<(), StoreError> {
        self.check_up()?;
        self.rows
            .lock()
            .unwrap()
            .remove(person_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(person_id.to_string()))
    }

    fn set_enabled(&self, person_id: &str, enabled: bool) -> Result<(), StoreError> {
        self.check_up()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(person_id) {
            Some(r) => {
                r.enabled = enabled;
                Ok(())
            }
            None => Err(StoreError::NotFound(person_id.to_string())),
        }
    }
}

/// `FaceCodec` that replays pre-scripted results in call order.
#[derive(Default)]
pub(crate) struct ScriptedCodec {
    detections: VecDeque<Result<Vec<BoundingBox>, CodecError>>,
    embeddings: VecDeque<Result<Embedding, CodecError>>,
}

impl ScriptedCodec {
    pub fn push_detect(&mut self, result: Result<Vec<BoundingBox>, CodecError>) {
        self.detections.push_back(result);
    }

    pub fn push_embed(&mut self, result: Result<Embedding, CodecError>) {
        self.embeddings.push_back(result);
    }
}

impl FaceCodec for ScriptedCodec {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, CodecError> {
        self.detections
            .pop_front()
            .expect("unscripted detect call")
    }

    fn embed(&mut self, _frame: &Frame, _face: &BoundingBox) -> Result<Embedding, CodecError> {
        self.embeddings.pop_front().expect("unscripted embed call")
    }
}

pub(crate) fn face_box(confidence: f32) -> BoundingBox {
    BoundingBox {
        x: 10.0,
        y: 10.0,
        width: 40.0,
        height: 40.0,
        confidence,
    }
}

pub(crate) fn trained_record(person_id: &str, values: Vec<f32>) -> PersonRecord {
    PersonRecord {
        person_id: person_id.to_string(),
        display_name: format!("Person {person_id}"),
        embedding: Some(Embedding::new(values)),
        training_image_count: 1,
        enabled: true,
        last_trained_at: None,
        metadata: serde_json::Value::Null,
    }
}
