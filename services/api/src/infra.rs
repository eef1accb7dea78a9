use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use altscore::scoring::runtime::{
        check_frame_schema, DeclaredSlot, InputFrame, ModelArtifact, ModelRuntime, OutputTensor,
        PredictionError, INPUT_SCHEMA,
    };
    use altscore::scoring::CreditScorer;
    use altscore::store::{RecordStore, StoreError, StoredRecord};
    use std::sync::{Arc, Mutex};

    /// Record store double backed by a plain vector, mirroring the CSV store's
    /// insertion-order semantics.
    #[derive(Default)]
    pub(crate) struct InMemoryRecordStore {
        records: Arc<Mutex<Vec<StoredRecord>>>,
    }

    impl RecordStore for InMemoryRecordStore {
        fn ensure_store(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn append(&self, record: &StoredRecord) -> Result<(), StoreError> {
            self.records
                .lock()
                .expect("store mutex poisoned")
                .push(record.clone());
            Ok(())
        }

        fn remove_last(&self) -> Result<Option<String>, StoreError> {
            Ok(self
                .records
                .lock()
                .expect("store mutex poisoned")
                .pop()
                .map(|record| record.user_id))
        }

        fn scan(&self) -> Result<Vec<StoredRecord>, StoreError> {
            Ok(self.records.lock().expect("store mutex poisoned").clone())
        }

        fn last_user_id(&self) -> Result<Option<String>, StoreError> {
            Ok(self
                .records
                .lock()
                .expect("store mutex poisoned")
                .last()
                .map(|record| record.user_id.clone()))
        }
    }

    #[derive(Debug)]
    struct FixedOutputs {
        name: String,
        inputs: Vec<DeclaredSlot>,
        outputs: Vec<OutputTensor>,
    }

    impl ModelArtifact for FixedOutputs {
        fn name(&self) -> &str {
            &self.name
        }

        fn declared_inputs(&self) -> &[DeclaredSlot] {
            &self.inputs
        }

        fn run(&self, frame: &InputFrame) -> Result<Vec<OutputTensor>, PredictionError> {
            check_frame_schema(&self.name, &self.inputs, frame)?;
            Ok(self.outputs.clone())
        }
    }

    fn fixed(name: &str, outputs: Vec<OutputTensor>) -> Box<dyn ModelArtifact> {
        Box::new(FixedOutputs {
            name: name.to_string(),
            inputs: INPUT_SCHEMA
                .iter()
                .map(|slot| DeclaredSlot {
                    name: slot.name.to_string(),
                    dtype: slot.dtype,
                })
                .collect(),
            outputs,
        })
    }

    /// A scorer whose three models always answer "Low Risk" / 62.4 / 58.0, which blends
    /// to a final score of 68.
    pub(crate) fn stub_scorer() -> CreditScorer {
        let classifier = fixed(
            "stub-classifier",
            vec![
                OutputTensor::Bytes {
                    values: vec![b"Low Risk".to_vec()],
                },
                OutputTensor::Real {
                    values: vec![0.1, 0.7, 0.2],
                    shape: vec![1, 3],
                },
            ],
        );
        let regressor_a = fixed(
            "stub-regressor-a",
            vec![OutputTensor::Real {
                values: vec![62.4],
                shape: vec![1, 1],
            }],
        );
        let regressor_b = fixed(
            "stub-regressor-b",
            vec![OutputTensor::Real {
                values: vec![58.0],
                shape: vec![1],
            }],
        );
        CreditScorer::new(ModelRuntime::new(classifier, regressor_a, regressor_b))
    }
}
