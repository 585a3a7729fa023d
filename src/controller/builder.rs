use super::core::QualityController;
use crate::config::QualityConfig;
use crate::error::Result;
use crate::observer::{QualityObserver, TracingObserver};
use crate::resolution::ResolutionTable;

/// Builder for the quality controller
pub struct QualityControllerBuilder {
    config: Option<QualityConfig>,
    table: Option<ResolutionTable>,
    observer: Option<Box<dyn QualityObserver>>,
}

impl QualityControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            table: None,
            observer: None,
        }
    }

    pub fn config(mut self, config: QualityConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the catalog selected by the config
    pub fn table(mut self, table: ResolutionTable) -> Self {
        self.table = Some(table);
        self
    }

    pub fn observer<O: QualityObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Build the controller; a missing config falls back to defaults
    pub fn build(self) -> Result<QualityController> {
        let config = self.config.unwrap_or_default();
        let observer = self
            .observer
            .unwrap_or_else(|| Box::new(TracingObserver));

        match self.table {
            Some(table) => QualityController::with_table(&config, table, observer),
            None => QualityController::with_observer(&config, observer),
        }
    }
}

impl Default for QualityControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
