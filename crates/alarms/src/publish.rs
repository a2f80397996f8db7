use anyhow::Context;
use futures::future::BoxFuture;
use futures::FutureExt;
use models::NestedTemplate;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use url::Url;

/// Publisher stores a NestedTemplate at a location from which it may be
/// retrieved when the parent fragment is deployed, and returns its URL.
pub trait Publisher: Send + Sync {
    fn publish<'a>(&'a self, template: &'a NestedTemplate) -> BoxFuture<'a, anyhow::Result<Url>>;
}

/// DirectoryPublisher writes each template to a uniquely-named JSON file
/// of a local directory.
#[derive(Debug)]
pub struct DirectoryPublisher {
    dir: PathBuf,
}

impl DirectoryPublisher {
    /// Build a DirectoryPublisher into `dir`, which is created if it doesn't exist.
    pub fn new(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();

        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create publish directory {}", dir.display()))?;
        let dir = std::fs::canonicalize(dir)
            .with_context(|| format!("failed to resolve publish directory {}", dir.display()))?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, template: &NestedTemplate) -> anyhow::Result<Url> {
        let body = serde_json::to_vec_pretty(template).context("failed to serialize template")?;
        let path = self.dir.join(format!("{}.json", uuid::Uuid::new_v4()));

        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write template to {}", path.display()))?;

        tracing::debug!(path = %path.display(), "wrote nested template");

        Url::from_file_path(&path)
            .map_err(|()| anyhow::anyhow!("{} is not an absolute path", path.display()))
    }
}

impl Publisher for DirectoryPublisher {
    fn publish<'a>(&'a self, template: &'a NestedTemplate) -> BoxFuture<'a, anyhow::Result<Url>> {
        self.write(template).boxed()
    }
}

/// MemoryPublisher retains published templates in memory,
/// under sequentially numbered `memory:///` URLs.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    templates: Mutex<Vec<NestedTemplate>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Templates published so far, in publication order.
    pub fn templates(&self) -> Vec<NestedTemplate> {
        self.templates.lock().unwrap().clone()
    }

    /// Fetch the template published under `url`.
    pub fn get(&self, url: &str) -> Option<NestedTemplate> {
        let index: usize = url.strip_prefix("memory:///")?.parse().ok()?;
        self.templates.lock().unwrap().get(index).cloned()
    }
}

impl Publisher for MemoryPublisher {
    fn publish<'a>(&'a self, template: &'a NestedTemplate) -> BoxFuture<'a, anyhow::Result<Url>> {
        let index = {
            let mut templates = self.templates.lock().unwrap();
            templates.push(template.clone());
            templates.len() - 1
        };
        let url = Url::parse(&format!("memory:///{index}")).map_err(anyhow::Error::from);

        futures::future::ready(url).boxed()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_directory_publisher() {
        let tmp = tempfile::tempdir().unwrap();
        let publisher = DirectoryPublisher::new(tmp.path().join("stacks")).unwrap();
        let template = NestedTemplate::new(BTreeMap::new(), BTreeMap::new());

        let first = publisher.publish(&template).await.unwrap();
        let second = publisher.publish(&template).await.unwrap();

        assert_eq!(first.scheme(), "file");
        assert_ne!(first, second);

        let path = first.to_file_path().unwrap();
        assert!(path.starts_with(publisher.dir()));

        let content: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(content, serde_json::to_value(&template).unwrap());
    }

    #[tokio::test]
    async fn test_memory_publisher() {
        let publisher = MemoryPublisher::new();
        let template = NestedTemplate::new(BTreeMap::new(), BTreeMap::new());

        let url = publisher.publish(&template).await.unwrap();
        assert_eq!(url.as_str(), "memory:///0");
        assert_eq!(
            publisher.publish(&template).await.unwrap().as_str(),
            "memory:///1"
        );

        assert_eq!(publisher.templates().len(), 2);
        assert_eq!(publisher.get("memory:///0"), Some(template));
        assert_eq!(publisher.get("memory:///7"), None);
    }
}
