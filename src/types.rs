use serde::{Deserialize, Serialize};

/// Binary occurrence label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Absence,
    Presence,
}

impl Label {
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            Label::Presence
        } else {
            Label::Absence
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Label::Absence => 0.0,
            Label::Presence => 1.0,
        }
    }

    pub fn complement(self) -> Self {
        match self {
            Label::Absence => Label::Presence,
            Label::Presence => Label::Absence,
        }
    }

    pub fn is_presence(self) -> bool {
        self == Label::Presence
    }
}

/// A labeled feature vector drawn from the environment.
///
/// Feature values are expected to be normalized into `[-1, 1]`, which is the
/// domain rule genes live in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    features: Vec<f64>,
    label: Label,
}

impl Sample {
    pub fn new(features: Vec<f64>, label: Label) -> Self {
        Self { features, label }
    }

    pub fn presence(features: Vec<f64>) -> Self {
        Self::new(features, Label::Presence)
    }

    pub fn absence(features: Vec<f64>) -> Self {
        Self::new(features, Label::Absence)
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn dimension(&self) -> usize {
        self.features.len()
    }
}
