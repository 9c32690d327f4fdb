use crate::engine::{EngineError, EngineHandle};
use zbus::interface;

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
///
/// Handlers are thin wrappers: they translate wire payloads to engine
/// requests and engine results to JSON strings, nothing more.
pub struct AttendanceService {
    engine: EngineHandle,
    default_threshold: f32,
}

impl AttendanceService {
    pub fn new(engine: EngineHandle, default_threshold: f32) -> Self {
        Self {
            engine,
            default_threshold,
        }
    }
}

fn failed(err: EngineError) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Enroll (or re-enroll) a person from a batch of photos.
    /// `metadata_json` is stored verbatim; pass "null" for none.
    async fn train(
        &self,
        person_id: &str,
        display_name: &str,
        metadata_json: &str,
        images: Vec<Vec<u8>>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(person_id, images = images.len(), "train requested");
        let metadata: serde_json::Value = serde_json::from_str(metadata_json)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("metadata: {e}")))?;

        let summary = self
            .engine
            .train(
                person_id.to_string(),
                display_name.to_string(),
                metadata,
                images,
            )
            .await
            .map_err(failed)?;

        Ok(serde_json::json!({
            "success": true,
            "person_id": summary.person_id,
            "images_supplied": summary.images_supplied,
            "images_used": summary.images_used,
        })
        .to_string())
    }

    /// Run mass recognition over a group photo. `threshold <= 0` means use
    /// the configured default.
    async fn recognize(&self, image: Vec<u8>, threshold: f64) -> zbus::fdo::Result<String> {
        tracing::info!(bytes = image.len(), "recognize requested");
        let threshold = (threshold > 0.0).then_some(threshold as f32);

        let summary = self
            .engine
            .recognize(image, threshold)
            .await
            .map_err(failed)?;

        Ok(serde_json::json!({
            "success": true,
            "request_id": summary.request_id.to_string(),
            "threshold": summary.threshold,
            "annotated_image_path": summary.annotated_path,
            "total_detected": summary.report.total_detected,
            "identified": summary.report.identified_count,
            "unidentified": summary.report.unidentified_count,
            "processing_time_ms": summary.report.processing_time.as_millis() as u64,
            "faces": summary.report.faces,
        })
        .to_string())
    }

    /// Delete a person's enrollment data.
    async fn remove(&self, person_id: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(person_id, "remove requested");
        self.engine
            .remove(person_id.to_string())
            .await
            .map_err(failed)?;
        Ok(true)
    }

    /// Toggle a person's participation in matching.
    async fn set_enabled(&self, person_id: &str, enabled: bool) -> zbus::fdo::Result<bool> {
        tracing::info!(person_id, enabled, "set_enabled requested");
        self.engine
            .set_enabled(person_id.to_string(), enabled)
            .await
            .map_err(failed)?;
        Ok(true)
    }

    /// Training status for one person.
    async fn training_status(&self, person_id: &str) -> zbus::fdo::Result<String> {
        let record = self
            .engine
            .training_status(person_id.to_string())
            .await
            .map_err(failed)?;

        let body = match record {
            Some(r) => serde_json::json!({
                "trained": r.embedding.is_some(),
                "person_id": r.person_id,
                "display_name": r.display_name,
                "training_image_count": r.training_image_count,
                "enabled": r.enabled,
                "last_trained_at": r.last_trained_at.map(|t| t.to_rfc3339()),
            }),
            None => serde_json::json!({
                "trained": false,
                "person_id": person_id,
            }),
        };
        Ok(body.to_string())
    }

    /// Currently matchable persons as a JSON array.
    async fn list_persons(&self) -> zbus::fdo::Result<String> {
        let enrolled = self.engine.list_enrolled().await.map_err(failed)?;
        let list: Vec<_> = enrolled
            .into_iter()
            .map(|(person_id, display_name)| {
                serde_json::json!({
                    "person_id": person_id,
                    "display_name": display_name,
                })
            })
            .collect();
        Ok(serde_json::Value::Array(list).to_string())
    }

    /// Daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let enrolled = self.engine.list_enrolled().await.map_err(failed)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "enrolled": enrolled.len(),
            "similarity_threshold": self.default_threshold,
        })
        .to_string())
    }
}
