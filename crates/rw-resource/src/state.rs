use rw_api_client::ApiError;
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot of one async resource.
///
/// A new request sets `loading` and clears `error` but keeps the previous
/// `data` until the new outcome is known; a terminal failure clears `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<ApiError>,
    /// Epoch milliseconds of the last committed success.
    pub last_updated: Option<u128>,
}

impl<T> Default for ApiState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            last_updated: None,
        }
    }
}

impl<T> ApiState<T> {
    pub fn is_idle(&self) -> bool {
        !self.loading && self.data.is_none() && self.error.is_none()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|err| err.message.clone())
    }

    pub(crate) fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub(crate) fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.loading = false;
        self.error = None;
        self.last_updated = Some(epoch_ms());
    }

    pub(crate) fn fail(&mut self, error: ApiError) {
        self.data = None;
        self.loading = false;
        self.error = Some(error);
    }
}

pub(crate) fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
