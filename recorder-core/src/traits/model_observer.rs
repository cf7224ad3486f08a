use crate::models::model::Model;

/// Receives every model update published by the controller.
///
/// Called from whichever thread changed the model (intent callers, the
/// elapsed-time refresh, the event loop). Implementations should marshal to
/// the UI thread if needed.
pub trait ModelObserver: Send + Sync {
    fn on_model_changed(&self, model: &Model);
}
