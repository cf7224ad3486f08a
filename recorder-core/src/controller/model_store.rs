use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::model::Model;
use crate::traits::model_observer::ModelObserver;

/// The observable model plus its observer.
///
/// Observers receive snapshots in the order the changes were applied. The
/// model lock is released before notifying, so an observer may read the model.
#[derive(Default)]
pub(crate) struct ModelStore {
    model: Mutex<Model>,
    observer: Mutex<Option<Arc<dyn ModelObserver>>>,
    delivery: Mutex<()>,
}

impl ModelStore {
    pub(crate) fn snapshot(&self) -> Model {
        self.model.lock().clone()
    }

    pub(crate) fn set_observer(&self, observer: Arc<dyn ModelObserver>) {
        *self.observer.lock() = Some(observer);
    }

    pub(crate) fn update(&self, change: impl FnOnce(&mut Model)) {
        let _delivery = self.delivery.lock();
        let snapshot = {
            let mut model = self.model.lock();
            change(&mut model);
            model.clone()
        };
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_model_changed(&snapshot);
        }
    }
}
