use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::ocr::TitleRecognizer;

/// Runs the `tesseract` command line engine on one image and reads its text
/// from stdout.
#[derive(Debug, Clone)]
pub struct TesseractBridge {
    program: PathBuf,
    lang: String,
}

impl Default for TesseractBridge {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            lang: "eng".to_string(),
        }
    }
}

impl TesseractBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: PathBuf) -> Self {
        self.program = program;
        self
    }

    pub fn with_lang(mut self, lang: String) -> Self {
        self.lang = lang;
        self
    }
}

impl TitleRecognizer for TesseractBridge {
    fn recognize(&self, image: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()
            .with_context(|| format!("failed to invoke {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tesseract failed on {}: {stderr}", image.display());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_engine_is_an_error() {
        let bridge = TesseractBridge::new().with_program(PathBuf::from("/nonexistent/tesseract"));
        assert!(bridge.recognize(Path::new("1.png")).is_err());
    }
}
