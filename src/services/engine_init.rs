use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::RenderError;
use crate::rendering::{LayoutEngine, RasterEngine};

type InitFuture = Shared<BoxFuture<'static, Result<(), String>>>;

/// Bootstraps both rendering engines once per process.
///
/// Concurrent callers share a single in-flight bootstrap. The outcome,
/// success or failure, is memoized until [`EngineInitializer::reset`].
pub struct EngineInitializer {
    layout: Arc<dyn LayoutEngine>,
    raster: Arc<dyn RasterEngine>,
    state: Mutex<Option<InitFuture>>,
}

impl EngineInitializer {
    pub fn new(layout: Arc<dyn LayoutEngine>, raster: Arc<dyn RasterEngine>) -> Self {
        Self {
            layout,
            raster,
            state: Mutex::new(None),
        }
    }

    pub fn layout(&self) -> &Arc<dyn LayoutEngine> {
        &self.layout
    }

    pub fn raster(&self) -> &Arc<dyn RasterEngine> {
        &self.raster
    }

    /// Wait until both engines are bootstrapped.
    pub async fn ensure_ready(&self) -> Result<(), RenderError> {
        let init = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.get_or_insert_with(|| self.start()).clone()
        };
        init.await.map_err(RenderError::EngineInit)
    }

    /// Forget the memoized outcome so the next caller bootstraps again.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.take().is_some() {
            tracing::info!("Engine initialization reset");
        }
    }

    fn start(&self) -> InitFuture {
        let layout = Arc::clone(&self.layout);
        let raster = Arc::clone(&self.raster);

        async move {
            tracing::info!("Bootstrapping rendering engines");
            // Both run to completion even if one fails.
            let (layout_result, raster_result) =
                tokio::join!(layout.bootstrap(), raster.bootstrap());

            let failures: Vec<String> = [
                (layout.name(), layout_result),
                (raster.name(), raster_result),
            ]
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|e| format!("{name}: {e}")))
            .collect();

            if failures.is_empty() {
                tracing::info!("Rendering engines ready");
                Ok(())
            } else {
                let message = failures.join("; ");
                tracing::error!(error = %message, "Engine bootstrap failed");
                Err(message)
            }
        }
        .boxed()
        .shared()
    }
}
