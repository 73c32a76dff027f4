use crate::io::DEFAULT_MAX_FILE_SIZE;

/// Settings shared by every load a [`MIDILoader`](crate::loader::MIDILoader) runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Files larger than this many bytes are refused before decoding.
    pub max_file_size: u64,
    /// Name given to the worker thread of non-blocking loads.
    pub worker_name: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            worker_name: "midi-loader".to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_worker_name(mut self, worker_name: impl Into<String>) -> Self {
        self.worker_name = worker_name.into();
        self
    }
}
