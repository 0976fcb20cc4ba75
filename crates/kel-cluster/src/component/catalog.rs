use super::{ComponentManifest, ComponentResource, NamespacedResource, PlatformComponent, Router};

pub const KEL_SYSTEM: NamespacedResource = NamespacedResource::namespace("kel", "kel-system");
pub const KEL_BUILDS: NamespacedResource = NamespacedResource::namespace("kel", "kel-builds");
pub const KUBE_DNS: ComponentManifest = ComponentManifest::new("kubernetes", "kube-dns", 1);
pub const API_DATABASE: ComponentManifest = ComponentManifest::new("kel", "api-database", 1).with_disk();
pub const API_CACHE: ComponentManifest = ComponentManifest::new("kel", "api-cache", 1).with_disk();
pub const BLOBSTORE_DATA: ComponentManifest =
    ComponentManifest::new("kel", "blobstore-data", 1).with_disk();
pub const BLOBSTORE: ComponentManifest =
    ComponentManifest::new("kel", "blobstore", 3).with_bundle("blobstore");
pub const LOG_STORE: ComponentManifest = ComponentManifest::new("kel", "log-store", 3);
pub const LOGSTASH: ComponentManifest = ComponentManifest::new("kel", "logstash", 1);
pub const LOG_AGENT: NamespacedResource = NamespacedResource::daemon_set("kel", "log-agent");
pub const API_WEB: ComponentManifest = ComponentManifest::new("kel", "api-web", 3).with_bundle("api");
pub const API_WORKER: ComponentManifest =
    ComponentManifest::new("kel", "api-worker", 4).with_bundle("api");

/// Ordered platform components, keyed by name
///
/// Components are created in order and destroyed in reverse.
#[derive(Debug, Default)]
pub struct Platform {
    components: Vec<Box<dyn PlatformComponent>>,
}

impl Platform {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Namespaces first, then cluster DNS, then stateful services ahead of the
    /// services using them, with the router last so it only takes traffic
    /// once its backends exist.
    pub fn standard() -> Self {
        Self::empty()
            .with_component(KEL_SYSTEM)
            .with_component(KEL_BUILDS)
            .with_component(ComponentResource::new(KUBE_DNS))
            .with_component(ComponentResource::new(API_DATABASE))
            .with_component(ComponentResource::new(API_CACHE))
            .with_component(ComponentResource::new(BLOBSTORE_DATA))
            .with_component(ComponentResource::new(BLOBSTORE))
            .with_component(ComponentResource::new(LOG_STORE))
            .with_component(ComponentResource::new(LOGSTASH))
            .with_component(LOG_AGENT)
            .with_component(ComponentResource::new(API_WEB))
            .with_component(ComponentResource::new(API_WORKER))
            .with_component(Router::new())
    }

    pub fn with_component(mut self, component: impl PlatformComponent + 'static) -> Self {
        self.components.push(Box::new(component));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn PlatformComponent> {
        self.iter().find(|component| component.name() == name)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &dyn PlatformComponent> {
        self.components
            .iter()
            .map(|component| component.as_ref() as &dyn PlatformComponent)
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|component| component.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn component(&self, index: usize) -> Option<&dyn PlatformComponent> {
        Some(self.components.get(index)?.as_ref())
    }
}
