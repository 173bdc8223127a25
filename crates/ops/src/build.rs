//! Build command implementation

use crate::{BuildOrchestrator, OpsCtx};
use kiln_errors::Error;
use kiln_types::BuildReport;
use std::path::Path;

/// Build the project at `manifest_path` into `output_dir`
///
/// # Errors
///
/// Returns the stage-annotated error of the failed orchestration step.
pub async fn build(
    ctx: &OpsCtx,
    manifest_path: &Path,
    output_dir: &Path,
) -> Result<BuildReport, Error> {
    BuildOrchestrator::new(ctx).run(manifest_path, output_dir).await
}
