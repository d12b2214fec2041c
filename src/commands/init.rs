// ABOUTME: Init command implementation.
// ABOUTME: Writes the config template and seeds the simulated cloud for every environment.

use fleetswap::cloud::{CloudDocument, SimulatedCloud};
use fleetswap::config::init_config;
use fleetswap::error::Result;
use fleetswap::output::Output;
use fleetswap::types::{Color, Version};
use std::path::Path;

const SAMPLE_RELEASES: [(&str, &str); 3] = [("v121", "main"), ("v122", "main"), ("v123", "main")];

/// Release the seeded blue fleets run.
const SEED_VERSION: &str = "v122";

/// Create `fleetswap.yml` in `dir` and a cloud document with blue active everywhere.
pub fn init(dir: &Path, force: bool, output: &Output) -> Result<()> {
    let (config_path, config) = init_config(dir, force)?;
    output.progress(&format!("  → Wrote {}", config_path.display()));

    let document_path = config.document_path();
    if document_path.exists() && !force {
        output.progress(&format!(
            "  → Keeping existing cloud document {}",
            document_path.display()
        ));
    } else {
        let cloud = SimulatedCloud::open(&document_path)?;
        cloud.edit(|doc| {
            *doc = CloudDocument::default();
            for (version, branch) in SAMPLE_RELEASES {
                if let Ok(version) = Version::new(version) {
                    doc.add_release(version, branch);
                }
            }
            for (name, env) in &config.environments {
                doc.seed_environment(name, env);
                if let Ok(version) = Version::new(SEED_VERSION) {
                    doc.assign_version(name, Color::Blue, version);
                }
            }
        })?;
        output.progress(&format!("  → Seeded {}", document_path.display()));
    }

    output.success(&format!("Initialized {}", config_path.display()));
    Ok(())
}
