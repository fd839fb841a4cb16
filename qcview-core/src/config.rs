//! Configuration file support for qcview
//!
//! Loads report configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.qcviewrc.json` in the data directory
//! 3. `qcview.config.json` in the data directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::cutoff::CutoffRule;
use crate::label::LabelScheme;
use crate::palette::{Palette, COLOURS, HIGHLIGHT_COLOUR};
use crate::reshape::{SortKeys, VisualStyle, HIGHLIGHT_MARKER_SIZE, MARKER_SIZE};
use crate::schema::{ReportSchema, BARCODES, LANE, PROJECT, RUN, SAMPLE};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Which built-in marker shape palette to cycle through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeSet {
    Full,
    #[default]
    Curated,
}

/// qcview configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QcviewConfig {
    /// Pass/fail cutoffs, evaluated in order
    #[serde(default)]
    pub cutoffs: Vec<CutoffRule>,

    /// Colour cycle as hex codes (default: six built-in colours)
    #[serde(default)]
    pub colours: Option<Vec<String>>,

    /// Marker shape palette (default: curated)
    #[serde(default)]
    pub shapes: Option<ShapeSet>,

    /// Colour of highlighted rows
    #[serde(default)]
    pub highlight_colour: Option<String>,

    /// Marker size of ordinary rows (default: 12)
    #[serde(default)]
    pub marker_size: Option<f64>,

    /// Marker size of highlighted rows (default: 18)
    #[serde(default)]
    pub highlight_marker_size: Option<f64>,

    /// Default sort keys
    #[serde(default)]
    pub sort: Option<SortKeys>,

    /// Hover label ordering and prefixes
    #[serde(default)]
    pub label: Option<LabelScheme>,

    /// Columns copied into failure tables (default: report's identity columns)
    #[serde(default)]
    pub identity_columns: Option<Vec<String>>,
}

/// Resolved configuration with defaults filled in
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub cutoffs: Vec<CutoffRule>,
    pub style: VisualStyle,
    pub sort: Option<SortKeys>,
    pub label: LabelScheme,
    pub identity_columns: Option<Vec<String>>,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

const HEX_COLOUR: &str = r"^#[0-9A-Fa-f]{6}$";

impl QcviewConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        let hex = Regex::new(HEX_COLOUR).context("invalid colour pattern")?;

        if let Some(ref colours) = self.colours {
            if colours.is_empty() {
                anyhow::bail!("colours must contain at least one entry");
            }
            for colour in colours {
                if !hex.is_match(colour) {
                    anyhow::bail!("colours: {} is not a #rrggbb hex code", colour);
                }
            }
        }

        if let Some(ref colour) = self.highlight_colour {
            if !hex.is_match(colour) {
                anyhow::bail!("highlight_colour: {} is not a #rrggbb hex code", colour);
            }
        }

        let size = self.marker_size.unwrap_or(MARKER_SIZE);
        let highlight_size = self.highlight_marker_size.unwrap_or(HIGHLIGHT_MARKER_SIZE);
        if !size.is_finite() || size <= 0.0 {
            anyhow::bail!("marker_size must be positive (got {})", size);
        }
        if !highlight_size.is_finite() || highlight_size <= size {
            anyhow::bail!(
                "highlight_marker_size ({}) must be larger than marker_size ({})",
                highlight_size,
                size
            );
        }

        // Failure tables hold identity columns and one column per rule label
        let identity: HashSet<String> = match self.identity_columns {
            Some(ref columns) => columns.iter().cloned().collect(),
            None => ReportSchema::single_lane()
                .identity_columns
                .into_iter()
                .chain(ReportSchema::call_ready().identity_columns)
                .collect(),
        };

        let mut labels = HashSet::new();
        for rule in &self.cutoffs {
            if identity.contains(&rule.label) {
                anyhow::bail!(
                    "cutoffs: label {} collides with an identity column of the failure table",
                    rule.label
                );
            }
            if rule.label.is_empty() {
                anyhow::bail!("cutoffs: rule on column {} has an empty label", rule.column);
            }
            if !labels.insert(rule.label.as_str()) {
                anyhow::bail!("cutoffs: duplicate label {}", rule.label);
            }
            if let Some(t) = rule.threshold {
                if !t.is_finite() {
                    anyhow::bail!("cutoffs.{}: threshold must be finite (got {})", rule.label, t);
                }
            }
        }

        if let Some(ref sort) = self.sort {
            if sort.primary.is_empty() || sort.secondary.is_empty() {
                anyhow::bail!("sort.primary and sort.secondary must be column names");
            }
        }

        if let Some(ref columns) = self.identity_columns {
            if columns.is_empty() {
                anyhow::bail!("identity_columns must name at least one column");
            }
        }

        Ok(())
    }

    /// Resolve config into the form the pipeline consumes
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let colours = match &self.colours {
            Some(c) => Palette::new(c.iter().cloned())?,
            None => Palette::colours(),
        };
        let shapes = match self.shapes.unwrap_or_default() {
            ShapeSet::Full => Palette::shapes_full(),
            ShapeSet::Curated => Palette::shapes_curated(),
        };

        Ok(ResolvedConfig {
            cutoffs: self.cutoffs.clone(),
            style: VisualStyle {
                colours,
                shapes,
                highlight_colour: self
                    .highlight_colour
                    .clone()
                    .unwrap_or_else(|| HIGHLIGHT_COLOUR.to_string()),
                marker_size: self.marker_size.unwrap_or(MARKER_SIZE),
                highlight_marker_size: self.highlight_marker_size.unwrap_or(HIGHLIGHT_MARKER_SIZE),
            },
            sort: self.sort.clone(),
            label: self.label.clone().unwrap_or_default(),
            identity_columns: self.identity_columns.clone(),
            config_path: None,
        })
    }

    /// Example configuration printed by `qcview config show` when nothing is found
    pub fn example() -> Self {
        QcviewConfig {
            cutoffs: vec![
                CutoffRule::fail_below("Min Reads", "reads", Some(10_000.0)),
                CutoffRule::fail_above("Max Duplication", "duplication", Some(0.5)),
            ],
            colours: Some(COLOURS.iter().map(|c| c.to_string()).collect()),
            shapes: Some(ShapeSet::Curated),
            highlight_colour: Some(HIGHLIGHT_COLOUR.to_string()),
            marker_size: Some(MARKER_SIZE),
            highlight_marker_size: Some(HIGHLIGHT_MARKER_SIZE),
            sort: Some(SortKeys::new(PROJECT, RUN)),
            label: None,
            identity_columns: Some(
                [SAMPLE, PROJECT, RUN, LANE, BARCODES]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            ),
        }
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        QcviewConfig::default().resolve()
    }
}

/// Discover and load a config file from the data directory
///
/// Search order:
/// 1. `.qcviewrc.json`
/// 2. `qcview.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(data_dir: &Path) -> Result<Option<(QcviewConfig, PathBuf)>> {
    for name in [".qcviewrc.json", "qcview.config.json"] {
        let path = data_dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<QcviewConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: QcviewConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for a data directory
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in the data directory.
/// Returns default config if nothing is found.
pub fn load_and_resolve(data_dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(data_dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (QcviewConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}
