//! Plain-text record of one run
//!
//! One file per run holding the question, the hint, the audit trace and the
//! stage outputs.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::pipeline::StageOutput;

/// Everything worth keeping from a run.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub started_at: DateTime<Local>,
    pub input: String,
    pub hint: String,
    pub log: String,
    pub outputs: Vec<StageOutput>,
}

impl Transcript {
    pub fn new(input: &str, hint: &str) -> Self {
        Self {
            started_at: Local::now(),
            input: input.to_string(),
            hint: hint.to_string(),
            log: String::new(),
            outputs: Vec::new(),
        }
    }

    /// `run_YYYY-MM-DD_HH-MM-SS.mmm.txt`
    pub fn file_name(&self) -> String {
        format!("run_{}.txt", self.started_at.format("%Y-%m-%d_%H-%M-%S%.3f"))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "SmartGPT run {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "\n== INPUT ==\n{}", self.input);
        let _ = writeln!(out, "\n== HINT ==\n{}", self.hint);
        let _ = writeln!(out, "\n== LOG ==\n{}", self.log);
        let _ = writeln!(out, "\n== OUTPUT ==");
        for output in &self.outputs {
            let _ = writeln!(out, "{}", output);
        }
        out
    }

    /// Write into `dir`, creating it if needed. Returns the file path.
    ///
    /// Never overwrites: a name already taken gets a `-1`, `-2`, ... suffix.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create runs directory {:?}", dir))?;

        let name = self.file_name();
        let stem = name.trim_end_matches(".txt");
        let mut path = dir.join(&name);
        let mut suffix = 0;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(self.render().as_bytes())
                        .with_context(|| format!("Failed to write transcript {:?}", path))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    suffix += 1;
                    path = dir.join(format!("{}-{}.txt", stem, suffix));
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create transcript {:?}", path));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    fn sample() -> Transcript {
        let mut transcript = Transcript::new("2+2?", "It is 4.");
        transcript.log = "user: 2+2?".to_string();
        transcript.outputs = vec![
            StageOutput::new(Stage::ChainOfThought(1), "4"),
            StageOutput::new(Stage::Resolution, "Yes, 4."),
        ];
        transcript
    }

    #[test]
    fn test_render_sections() {
        let text = sample().render();
        assert!(text.contains("== INPUT ==\n2+2?"));
        assert!(text.contains("== HINT ==\nIt is 4."));
        assert!(text.contains("== LOG ==\nuser: 2+2?"));
        assert!(text.contains("Option 1: 4\nresolution: Yes, 4.\n"));
    }

    #[test]
    fn test_save_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runs = dir.path().join("runs");

        let transcript = sample();
        let path = transcript.save(&runs).unwrap();

        assert!(path.starts_with(&runs));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("run_"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), transcript.render());
    }

    #[test]
    fn test_same_instant_saves_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let first = sample();
        let mut second = first.clone();
        second.input = "3+3?".to_string();

        let first_path = first.save(dir.path()).unwrap();
        let second_path = second.save(dir.path()).unwrap();

        assert_ne!(first_path, second_path);
        assert!(second_path.to_string_lossy().ends_with("-1.txt"));
        assert_eq!(std::fs::read_to_string(&first_path).unwrap(), first.render());
        assert_eq!(std::fs::read_to_string(&second_path).unwrap(), second.render());
    }

    #[test]
    fn test_file_name_has_milliseconds() {
        let name = sample().file_name();
        // run_YYYY-MM-DD_HH-MM-SS.mmm.txt
        assert_eq!(name.len(), "run_2024-01-01_00-00-00.000.txt".len());
        assert!(name.ends_with(".txt"));
    }
}
