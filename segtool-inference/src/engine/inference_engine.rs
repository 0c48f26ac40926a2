use anyhow::Result;
use ort::session::Session;
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// An ONNX Runtime session bound to the execution provider it was built
/// with.
pub struct OnnxSession {
    pub(crate) session: Session,
    pub(crate) executor: ExecutionProvider,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    Cuda(i32),
}

impl ExecutionProvider {
    pub fn describe(self) -> String {
        match self {
            ExecutionProvider::Cpu => "cpu".to_owned(),
            ExecutionProvider::Cuda(id) => format!("cuda:{id}"),
        }
    }
}

impl Deref for OnnxSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for OnnxSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl OnnxSession {
    pub fn new(url: impl AsRef<Path>, executor: ExecutionProvider) -> Result<Self> {
        let session = Session::builder()?
            .with_intra_threads(4)?
            .with_execution_providers([match executor {
                ExecutionProvider::Cuda(id) => {
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(id)
                        .build()
                        .error_on_failure()
                }
                ExecutionProvider::Cpu => ort::execution_providers::CPUExecutionProvider::default()
                    .build()
                    .error_on_failure(),
            }])?
            .commit_from_file(url)?;

        Ok(OnnxSession { session, executor })
    }

    pub fn executor(&self) -> ExecutionProvider {
        self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_file_fails_at_load() {
        let result = OnnxSession::new("nonexistent_model.onnx", ExecutionProvider::Cpu);
        assert!(result.is_err());
    }
}
