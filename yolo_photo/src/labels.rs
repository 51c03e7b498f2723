use crate::{
    config::{LabelsConfig, Validatable},
    error::{DetectError, Result},
};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Class names indexed by class id, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    class_labels: Vec<String>,
}

impl LabelSet {
    pub fn new(class_labels: Vec<String>) -> Self {
        Self { class_labels }
    }

    pub fn from_config(labels_cfg: &LabelsConfig) -> Result<Self> {
        Self::load(&labels_cfg.get_path())
    }

    pub fn load(filepath: &Path) -> Result<Self> {
        let file = File::open(filepath).map_err(|e| DetectError::io(filepath, e))?;
        let labels = Self::from_reader(io::BufReader::new(file))
            .map_err(|e| DetectError::io(filepath, e))?;

        tracing::info!("Loaded {} class labels from {:?}", labels.len(), filepath);
        Ok(labels)
    }

    /// One label per line, nothing trimmed. Trailing empty lines are
    /// dropped; an empty line before a label would shift every later class
    /// id, so it is rejected.
    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut class_labels = Vec::new();
        let mut blank_line = None;
        for (number, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.is_empty() {
                blank_line.get_or_insert(number + 1);
                continue;
            }
            if let Some(blank) = blank_line {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Empty label on line {} before {:?}", blank, line),
                ));
            }
            class_labels.push(line);
        }

        Ok(Self { class_labels })
    }

    pub fn get(&self, class_id: usize) -> Result<&str> {
        self.class_labels
            .get(class_id)
            .map(String::as_str)
            .ok_or(DetectError::LabelIndexOutOfRange {
                index: class_id,
                len: self.class_labels.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.class_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.class_labels.iter().map(String::as_str)
    }
}
