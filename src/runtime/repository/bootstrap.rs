use std::sync::Arc;

use super::{
    EmbeddedResources, ModuleContent, ModuleLocation, ModuleRepository, RepositoryError,
    ResourceRepository,
};
use crate::runtime::{module::PrebuiltModule, module_id::ModuleId, value::Value};

/// Natively provided module every bootstrap repository carries.
pub const KERNEL_MODULE: &str = "/loam/kernel";
/// Module a default top level is seeded from.
pub const BASE_MODULE: &str = "/loam/base";

const MANIFEST: &[u8] = include_bytes!("../../../lib/manifest.json");
const BASE: &[u8] = include_bytes!("../../../lib/src/loam/base.loam");
const LIST: &[u8] = include_bytes!("../../../lib/src/loam/list.loam");

static LIBRARY: EmbeddedResources = EmbeddedResources::new(
    "bootstrap",
    &[
        ("manifest.json", MANIFEST),
        ("src/loam/base.loam", BASE),
        ("src/loam/list.loam", LIST),
    ],
);

/// The language's own core library.
pub struct BootstrapRepository {
    library: ResourceRepository,
    kernel_id: ModuleId,
    kernel: Arc<PrebuiltModule>,
}

impl BootstrapRepository {
    pub fn new() -> Result<Self, RepositoryError> {
        let kernel = PrebuiltModule::new()
            .define("language", Value::string("loam"))
            .define("version", Value::string(env!("CARGO_PKG_VERSION")))
            .docs("Native bindings provided by the runtime itself.");

        Ok(Self {
            library: ResourceRepository::new(LIBRARY)?,
            kernel_id: ModuleId::parse_absolute(KERNEL_MODULE)
                .map_err(|err| RepositoryError::manifest("bootstrap", err.to_string()))?,
            kernel: Arc::new(kernel),
        })
    }
}

impl ModuleRepository for BootstrapRepository {
    fn identify(&self) -> &str {
        self.library.identify()
    }

    fn locate(&self, path: &ModuleId) -> Result<Option<ModuleLocation>, RepositoryError> {
        if *path == self.kernel_id {
            return Ok(Some(ModuleLocation {
                repository: self.identify().to_string(),
                source_name: format!("<builtin {KERNEL_MODULE}>"),
                content: ModuleContent::Prebuilt(Arc::clone(&self.kernel)),
            }));
        }
        self.library.locate(path)
    }

    fn collect_modules(
        &self,
        selector: &dyn Fn(&ModuleId) -> bool,
    ) -> Result<Vec<ModuleId>, RepositoryError> {
        let mut modules = self.library.collect_modules(selector)?;
        if selector(&self.kernel_id) {
            modules.push(self.kernel_id.clone());
            modules.sort();
        }
        Ok(modules)
    }
}
