//! Description of the model being submitted, and the writer that turns it
//! into solver input files.
//!
//! The geometry itself is owned by the host application; the engine only
//! sees the summary needed to decide whether a submission makes sense.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_error_threshold() -> f64 {
    20.0
}

/// What Prepare validates before anything is written or uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Document name; also the stem of the written input and upload archive.
    pub name: String,
    #[serde(default)]
    pub bodies: Vec<Body>,
    #[serde(default)]
    pub materials: Vec<Material>,
    /// Labels of fixed (Dirichlet) boundary conditions.
    #[serde(default)]
    pub fixed_constraints: Vec<String>,
    /// Target error in percent.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,
    /// Solver parameters passed through to the input file untouched.
    #[serde(default)]
    pub parameters: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub label: String,
    /// Number of 3D solids in the body's shape.
    #[serde(default)]
    pub solids: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Whether an actual material card was chosen for this object.
    #[serde(default)]
    pub selected: bool,
}

impl Analysis {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }
}

/// Serializes an analysis into solver input inside a working directory.
pub trait InputWriter: Send + Sync {
    /// Writes the input files and returns their paths.
    fn write_input(&self, analysis: &Analysis, directory: &Path) -> Result<Vec<PathBuf>>;
}

/// Writes `<name>.json` with the analysis parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonInputWriter;

impl InputWriter for JsonInputWriter {
    fn write_input(&self, analysis: &Analysis, directory: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(format!("{}.json", analysis.name));

        let material = analysis.materials.first().map(|m| m.name.clone());
        let input = serde_json::json!({
            "name": analysis.name,
            "analysis_type": "static",
            "error_threshold": analysis.error_threshold,
            "material": material,
            "fixed": analysis.fixed_constraints,
            "parameters": analysis.parameters,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&input)?)?;
        tracing::debug!("solver input written to {}", path.display());
        Ok(vec![path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        name = "bracket"
        fixed_constraints = ["ConstraintFixed"]
        error_threshold = 5.0

        [[bodies]]
        label = "Body"
        solids = 1

        [[materials]]
        name = "Steel"
        selected = true

        [parameters]
        load_n = 1200
    "#;

    #[test]
    fn parses_toml_description() {
        let analysis = Analysis::from_toml(SAMPLE).unwrap();
        assert_eq!(analysis.name, "bracket");
        assert_eq!(analysis.bodies, vec![Body { label: "Body".into(), solids: 1 }]);
        assert!(analysis.materials[0].selected);
        assert_eq!(analysis.error_threshold, 5.0);
        assert_eq!(analysis.parameters["load_n"], toml::Value::Integer(1200));
    }

    #[test]
    fn threshold_defaults_when_absent() {
        let analysis = Analysis::from_toml(r#"name = "x""#).unwrap();
        assert_eq!(analysis.error_threshold, 20.0);
        assert!(analysis.bodies.is_empty());
    }

    #[test]
    fn json_writer_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let analysis = Analysis::from_toml(SAMPLE).unwrap();
        let written = JsonInputWriter.write_input(&analysis, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("bracket.json")]);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(value["material"], "Steel");
        assert_eq!(value["error_threshold"], 5.0);
        assert_eq!(value["parameters"]["load_n"], 1200);
    }
}
