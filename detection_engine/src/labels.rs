use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Class labels indexed by model class id.
#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn label_for(&self, class_id: usize) -> String {
        match self.labels.get(class_id) {
            Some(label) => label.clone(),
            None => format!("Unknown class {}", class_id),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Reads one label per line. Lines in `label,red,green,blue` form keep only
/// the label; blank lines are ignored.
pub fn load_labels(filepath: &Path) -> io::Result<ClassLabels> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let label = line.split(',').next().unwrap_or_default().trim();
        if label.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            ));
        }
        labels.push(label.to_string());
    }

    Ok(ClassLabels::new(labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_labels_accepts_plain_and_colored_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "person").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "bicycle, 255, 0, 0").unwrap();

        let labels = load_labels(file.path()).unwrap();

        assert_eq!(labels.len(), 2);
        assert_eq!(labels.label_for(0), "person");
        assert_eq!(labels.label_for(1), "bicycle");
    }

    #[test]
    fn test_unknown_class_id_gets_placeholder_label() {
        let labels = ClassLabels::new(vec!["person".into()]);
        assert_eq!(labels.label_for(7), "Unknown class 7");
    }

    #[test]
    fn test_line_without_label_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ",255,0,0").unwrap();

        let err = load_labels(file.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
