//! Runtime command: the dev server child.

use crate::cli::RuntimeArgs;
use crate::codegen::DevManifest;
use crate::error::Result;
use crate::hmr;

/// Load the manifest and serve until stdin closes or an interrupt arrives.
pub async fn execute(args: RuntimeArgs) -> Result<()> {
    let manifest = DevManifest::load(&args.manifest)?;
    hmr::serve(manifest).await
}
