use crate::transcode::DEFAULT_EXPORT_NAME;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "stager.toml";

/// Paths for a labelling session, read from `stager.toml`.
///
/// Every field is optional in the file; command-line flags override it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub metadata: PathBuf,
    pub figures_dir: Option<PathBuf>,
    pub annotations: PathBuf,
    /// Import `annotations` at startup when the file exists.
    pub autoload: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata: PathBuf::from("output_figures/metadata.json"),
            figures_dir: None,
            annotations: PathBuf::from(DEFAULT_EXPORT_NAME),
            autoload: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.rebase(path.parent().unwrap_or_else(|| Path::new("")));
        Ok(config)
    }

    /// Load `path` if given, else `stager.toml` in the working directory if present.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_NAME);
                if local.is_file() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Relative paths in a config file are relative to that file.
    fn rebase(&mut self, base: &Path) {
        let join = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };
        self.metadata = join(&self.metadata);
        self.annotations = join(&self.annotations);
        self.figures_dir = self.figures_dir.as_deref().map(join);
    }

    pub fn with_overrides(
        mut self,
        metadata: Option<PathBuf>,
        figures_dir: Option<PathBuf>,
        annotations: Option<PathBuf>,
    ) -> Self {
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
        if figures_dir.is_some() {
            self.figures_dir = figures_dir;
        }
        if let Some(annotations) = annotations {
            self.annotations = annotations;
        }
        self
    }

    /// Explicit figures directory, or the directory holding the metadata file.
    pub fn resolve_figures_dir(&self) -> PathBuf {
        self.figures_dir.clone().unwrap_or_else(|| {
            self.metadata
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_figure_pipeline_layout() {
        let config = Config::default();
        assert_eq!(config.metadata, PathBuf::from("output_figures/metadata.json"));
        assert_eq!(config.resolve_figures_dir(), PathBuf::from("output_figures"));
        assert_eq!(config.annotations, PathBuf::from("annotations.csv"));
    }

    #[test]
    fn loads_and_rebases_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stager.toml");
        std::fs::write(
            &path,
            "metadata = \"figs/metadata.json\"\nfigures_dir = \"/srv/figs\"\nautoload = true\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.metadata, dir.path().join("figs/metadata.json"));
        assert_eq!(config.figures_dir, Some(PathBuf::from("/srv/figs")));
        assert_eq!(config.annotations, dir.path().join("annotations.csv"));
        assert!(config.autoload);
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stager.toml");
        std::fs::write(&path, "metdata = \"typo.json\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let config = Config::default().with_overrides(
            Some(PathBuf::from("m.json")),
            None,
            Some(PathBuf::from("out.csv")),
        );
        assert_eq!(config.metadata, PathBuf::from("m.json"));
        assert_eq!(config.resolve_figures_dir(), PathBuf::from(""));
        assert_eq!(config.annotations, PathBuf::from("out.csv"));
    }
}
