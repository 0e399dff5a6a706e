use super::ClassifierError;
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Label names indexed by the model's output position.
#[derive(Debug, Clone)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Result<Self, ClassifierError> {
        if names.is_empty() {
            return Err(ClassifierError::Labels("label set is empty".into()));
        }
        if let Some(position) = names.iter().position(|name| name.trim().is_empty()) {
            return Err(ClassifierError::Labels(format!(
                "label {} is blank",
                position
            )));
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> &str {
        &self.names[index]
    }
}

/// Reads one label per line. Line `n` names output index `n`.
pub fn load_labels(filepath: &Path) -> Result<ClassLabels, ClassifierError> {
    let file = File::open(filepath).map_err(|e| ClassifierError::Labels(e.to_string()))?;
    let reader = io::BufReader::new(file);

    let names = reader
        .lines()
        .map(|line| line.map(|l| l.trim().to_string()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| ClassifierError::Labels(e.to_string()))?;

    ClassLabels::new(names)
}
