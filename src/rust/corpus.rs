//! Line-oriented readers for training and evaluation data.
//!
//! - DA files: one dialogue act per line, in compact form. Blank lines are only allowed at
//!   the end of the file, so DA `i` always sits on line `i + 1`.
//! - Tree files: one tree per line as `lemma|formeme` tokens; a blank line is an empty tree.

use std::fs;
use std::path::Path;

use crate::classifier::ClassifierError;
use crate::dialogue_act::DialogueAct;
use crate::tree::Tree;

pub fn read_das<P: AsRef<Path>>(path: P) -> Result<Vec<DialogueAct>, ClassifierError> {
    let path = path.as_ref();
    log::info!("Reading DAs from {:?}...", path);
    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    let len = lines.iter().rposition(|line| !line.trim().is_empty()).map_or(0, |last| last + 1);
    lines[..len]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if line.trim().is_empty() {
                return Err(ClassifierError::Parse(format!("{:?}, line {}: blank line", path, i + 1)));
            }
            line.parse::<DialogueAct>()
                .map_err(|e| ClassifierError::Parse(format!("{:?}, line {}: {}", path, i + 1, e)))
        })
        .collect()
}

pub fn read_trees<P: AsRef<Path>>(path: P) -> Result<Vec<Tree>, ClassifierError> {
    let path = path.as_ref();
    log::info!("Reading trees from {:?}...", path);
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .map(|(i, line)| {
            line.parse::<Tree>()
                .map_err(|e| ClassifierError::Parse(format!("{:?}, line {}: {}", path, i + 1, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_read_das_and_trees() -> Result<(), Box<dyn std::error::Error>> {
        let dir = env::temp_dir().join(format!("treeclassif-corpus-{}", std::process::id()));
        fs::create_dir_all(&dir)?;
        let das_path = dir.join("train.das");
        let trees_path = dir.join("train.trees");
        fs::write(&das_path, "inform(food=Thai)\nrequest(area)\n\n\n")?;
        fs::write(&trees_path, "food|n:attr thai|adj:attr\n\n")?;

        let das = read_das(&das_path)?;
        assert_eq!(das.len(), 2);
        assert_eq!(das[1].to_string(), "request(area)");

        let trees = read_trees(&trees_path)?;
        assert_eq!(trees.len(), 2);
        assert!(trees[1].is_empty());

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_blank_da_line_keeps_numbering_with_trees() -> Result<(), Box<dyn std::error::Error>> {
        let dir = env::temp_dir().join(format!("treeclassif-corpus-blank-{}", std::process::id()));
        fs::create_dir_all(&dir)?;
        let path = dir.join("gap.das");
        fs::write(&path, "inform(food=Thai)\n\nrequest(area)\n")?;
        let err = read_das(&path).unwrap_err();
        assert!(matches!(err, ClassifierError::Parse(_)));
        assert!(err.to_string().contains("line 2"), "{}", err);

        fs::write(&path, "\n\n")?;
        assert!(read_das(&path)?.is_empty());
        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_read_reports_line_number() {
        let dir = env::temp_dir().join(format!("treeclassif-corpus-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.das");
        fs::write(&path, "inform(food=Thai)\ninform(\n").unwrap();
        let err = read_das(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_trees("/nonexistent/treeclassif/trees.txt");
        assert!(matches!(result, Err(ClassifierError::Io(_))));
    }
}
