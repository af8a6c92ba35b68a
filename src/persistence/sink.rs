use super::tree::ModelTree;
use crate::error::{GarpError, Result};
use std::path::{Path, PathBuf};

/// Destination for serialized models.
pub trait PersistenceSink {
    fn write_model(&mut self, tree: &ModelTree) -> Result<()>;
    fn read_model(&self) -> Result<ModelTree>;
}

/// Keeps the last written tree in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    tree: Option<ModelTree>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceSink for MemorySink {
    fn write_model(&mut self, tree: &ModelTree) -> Result<()> {
        self.tree = Some(tree.clone());
        Ok(())
    }

    fn read_model(&self) -> Result<ModelTree> {
        self.tree
            .clone()
            .ok_or_else(|| GarpError::Serialization("No model has been written".to_string()))
    }
}

/// Stores the tree as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceSink for JsonFileSink {
    fn write_model(&mut self, tree: &ModelTree) -> Result<()> {
        let json = serde_json::to_string_pretty(tree)?;
        std::fs::write(&self.path, json)?;
        log::info!("Wrote {} model to {}", tree.name, self.path.display());
        Ok(())
    }

    fn read_model(&self) -> Result<ModelTree> {
        let json = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&json).map_err(|e| {
            GarpError::Serialization(format!("Malformed model file {}: {}", self.path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::tree::AttrValue;

    #[test]
    fn test_memory_sink_requires_write() {
        let mut sink = MemorySink::new();
        assert!(sink.read_model().is_err());
        let tree = ModelTree::new("Garp").with_attr("Generations", AttrValue::Int(3));
        sink.write_model(&tree).unwrap();
        assert_eq!(sink.read_model().unwrap(), tree);
    }
}
