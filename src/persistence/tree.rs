use crate::error::{GarpError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttrValue {
    Str(String),
    Real(f64),
    Int(i64),
    RealArray(Vec<f64>),
}

/// Named node with ordered attributes and ordered child sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelTree {
    pub name: String,
    pub attributes: Vec<(String, AttrValue)>,
    pub subsections: Vec<ModelTree>,
}

impl ModelTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set an attribute, replacing an existing one of the same name in place.
    pub fn set_attr(&mut self, name: &str, value: AttrValue) -> &mut Self {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
        self
    }

    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn add_subsection(&mut self, child: ModelTree) -> &mut Self {
        self.subsections.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    fn required(&self, name: &str) -> Result<&AttrValue> {
        self.attr(name).ok_or_else(|| {
            GarpError::Serialization(format!("{} is missing attribute {}", self.name, name))
        })
    }

    pub fn attr_f64(&self, name: &str) -> Result<f64> {
        match self.required(name)? {
            AttrValue::Real(v) => Ok(*v),
            AttrValue::Int(v) => Ok(*v as f64),
            AttrValue::Str(s) => s.trim().parse().map_err(|_| self.type_error(name, "a real number")),
            AttrValue::RealArray(_) => Err(self.type_error(name, "a real number")),
        }
    }

    pub fn attr_usize(&self, name: &str) -> Result<usize> {
        match self.required(name)? {
            AttrValue::Int(v) if *v >= 0 => Ok(*v as usize),
            AttrValue::Real(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            AttrValue::Str(s) => s.trim().parse().map_err(|_| self.type_error(name, "a count")),
            _ => Err(self.type_error(name, "a count")),
        }
    }

    pub fn attr_str(&self, name: &str) -> Result<&str> {
        match self.required(name)? {
            AttrValue::Str(s) => Ok(s),
            _ => Err(self.type_error(name, "a string")),
        }
    }

    pub fn attr_f64_array(&self, name: &str) -> Result<&[f64]> {
        match self.required(name)? {
            AttrValue::RealArray(values) => Ok(values),
            _ => Err(self.type_error(name, "an array of reals")),
        }
    }

    pub fn subsection(&self, name: &str) -> Result<&ModelTree> {
        self.subsections
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| GarpError::Serialization(format!("{} has no {} section", self.name, name)))
    }

    pub fn subsections_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ModelTree> + 'a {
        self.subsections.iter().filter(move |s| s.name == name)
    }

    fn type_error(&self, name: &str, expected: &str) -> GarpError {
        GarpError::Serialization(format!("{}.{} is not {}", self.name, name, expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let tree = ModelTree::new("Rule")
            .with_attr("Type", AttrValue::Str("d".into()))
            .with_attr("Prediction", AttrValue::Real(1.0))
            .with_attr("Count", AttrValue::Int(3))
            .with_attr("Genes", AttrValue::RealArray(vec![-0.5, 0.5]));

        assert_eq!(tree.attr_str("Type").unwrap(), "d");
        assert_eq!(tree.attr_f64("Prediction").unwrap(), 1.0);
        assert_eq!(tree.attr_usize("Count").unwrap(), 3);
        assert_eq!(tree.attr_f64_array("Genes").unwrap(), &[-0.5, 0.5]);
        assert!(matches!(tree.attr_f64("Missing"), Err(GarpError::Serialization(_))));
        assert!(tree.attr_usize("Genes").is_err());
    }

    #[test]
    fn test_set_attr_replaces_in_place() {
        let mut tree = ModelTree::new("Garp");
        tree.set_attr("A", AttrValue::Int(1)).set_attr("B", AttrValue::Int(2));
        tree.set_attr("A", AttrValue::Int(5));
        assert_eq!(tree.attributes.len(), 2);
        assert_eq!(tree.attributes[0].0, "A");
        assert_eq!(tree.attr_usize("A").unwrap(), 5);
    }

    #[test]
    fn test_subsections_keep_order() {
        let mut tree = ModelTree::new("FittestRules");
        for i in 0..3 {
            tree.add_subsection(ModelTree::new("Rule").with_attr("Id", AttrValue::Int(i)));
        }
        tree.add_subsection(ModelTree::new("Other"));
        let ids: Vec<usize> = tree
            .subsections_named("Rule")
            .map(|r| r.attr_usize("Id").unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(tree.subsection("Other").is_ok());
        assert!(tree.subsection("Nope").is_err());
    }
}
