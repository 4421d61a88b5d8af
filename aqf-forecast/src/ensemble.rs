//! Per-horizon regression models and the artifact they are loaded from.
//!
//! An artifact is a JSON document (optionally gzipped) holding one model per
//! forecast step:
//!
//! ```json
//! {
//!   "version": 1,
//!   "horizons": [
//!     { "step": 1, "model": { "kind": "linear", "intercept": 2.0,
//!                             "weights": { "aqi_lag_1": 0.9 } } },
//!     { "step": 2, "model": { "kind": "tree_ensemble", "base_score": 0.5,
//!                             "trees": [ { "feature": "aqi_lag_1", "threshold": 50.0,
//!                                          "left": { "leaf": 40.0 },
//!                                          "right": { "leaf": 60.0 } } ] } }
//!   ]
//! }
//! ```
//!
//! Split nodes send `feature < threshold` left and everything else
//! (including NaN) right. Feature names must be columns of [`FeatureRow`].

use anyhow::{bail, Context};
use aqf_core::error::{ForecastError, Result};
use aqf_core::features::{FeatureColumn, FeatureRow};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Artifact format version this loader understands.
pub const ARTIFACT_VERSION: u32 = 1;

/// A regression model for one forecast horizon.
pub trait HorizonModel: Send + Sync + fmt::Debug {
    fn predict(&self, row: &FeatureRow) -> f64;

    /// Short name of the model family, for logs.
    fn kind(&self) -> &'static str;
}

/// `intercept + sum(weight * feature)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    intercept: f64,
    weights: Vec<(FeatureColumn, f64)>,
}

impl LinearModel {
    pub fn new(intercept: f64, weights: Vec<(FeatureColumn, f64)>) -> Self {
        Self { intercept, weights }
    }
}

impl HorizonModel for LinearModel {
    fn predict(&self, row: &FeatureRow) -> f64 {
        self.weights
            .iter()
            .fold(self.intercept, |acc, (column, weight)| acc + weight * row.get(*column))
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf(f64),
    Split {
        feature: FeatureColumn,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn evaluate(&self, row: &FeatureRow) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf(value) => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row.get(*feature) < *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Gradient-boosted trees: `base_score` plus the sum of every tree's leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    base_score: f64,
    trees: Vec<TreeNode>,
}

impl TreeEnsemble {
    pub fn new(base_score: f64, trees: Vec<TreeNode>) -> Self {
        Self { base_score, trees }
    }
}

impl HorizonModel for TreeEnsemble {
    fn predict(&self, row: &FeatureRow) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.evaluate(row))
    }

    fn kind(&self) -> &'static str {
        "tree_ensemble"
    }
}

/// One model per forecast step, steps `1..=horizons()`.
#[derive(Debug)]
pub struct ModelEnsemble {
    models: Vec<Box<dyn HorizonModel>>,
}

impl ModelEnsemble {
    /// Build from models ordered by step; `models[0]` serves step 1.
    pub fn from_models(models: Vec<Box<dyn HorizonModel>>) -> Self {
        Self { models }
    }

    pub fn horizons(&self) -> u32 {
        self.models.len() as u32
    }

    /// Run the model for `step` (1-based).
    ///
    /// A missing step or a non-finite output is a [`ForecastError::ModelUnavailable`].
    pub fn predict(&self, step: u32, row: &FeatureRow) -> Result<f64> {
        let model = step
            .checked_sub(1)
            .and_then(|i| self.models.get(i as usize))
            .ok_or_else(|| {
                ForecastError::ModelUnavailable(format!("no model for horizon {}", step))
            })?;
        let value = model.predict(row);
        if !value.is_finite() {
            return Err(ForecastError::ModelUnavailable(format!(
                "{} model for horizon {} returned {}",
                model.kind(),
                step,
                value
            )));
        }
        log::debug!("[AQF] ensemble: horizon {} raw prediction {:.3}", step, value);
        Ok(value)
    }
}

#[derive(Deserialize)]
struct ArtifactDoc {
    version: u32,
    horizons: Vec<HorizonDoc>,
}

#[derive(Deserialize)]
struct HorizonDoc {
    step: u32,
    model: ModelDoc,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelDoc {
    Linear {
        intercept: f64,
        weights: BTreeMap<String, f64>,
    },
    TreeEnsemble {
        base_score: f64,
        trees: Vec<NodeDoc>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeDoc {
    Leaf {
        leaf: f64,
    },
    Split {
        feature: String,
        threshold: f64,
        left: Box<NodeDoc>,
        right: Box<NodeDoc>,
    },
}

fn column(name: &str, step: u32) -> anyhow::Result<FeatureColumn> {
    match FeatureColumn::from_name(name) {
        Some(c) => Ok(c),
        None => bail!("horizon {}: unknown feature '{}'", step, name),
    }
}

fn build_node(doc: NodeDoc, step: u32) -> anyhow::Result<TreeNode> {
    Ok(match doc {
        NodeDoc::Leaf { leaf } => TreeNode::Leaf(leaf),
        NodeDoc::Split {
            feature,
            threshold,
            left,
            right,
        } => TreeNode::Split {
            feature: column(&feature, step)?,
            threshold,
            left: Box::new(build_node(*left, step)?),
            right: Box::new(build_node(*right, step)?),
        },
    })
}

fn build_model(doc: ModelDoc, step: u32) -> anyhow::Result<Box<dyn HorizonModel>> {
    Ok(match doc {
        ModelDoc::Linear { intercept, weights } => {
            let weights = weights
                .into_iter()
                .map(|(name, w)| Ok((column(&name, step)?, w)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Box::new(LinearModel::new(intercept, weights))
        }
        ModelDoc::TreeEnsemble { base_score, trees } => {
            let trees = trees
                .into_iter()
                .map(|t| build_node(t, step))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Box::new(TreeEnsemble::new(base_score, trees))
        }
    })
}

/// Parse an artifact document, requiring steps `1..=horizons` exactly once.
pub fn parse_ensemble(json: &str, horizons: u32) -> anyhow::Result<ModelEnsemble> {
    let doc: ArtifactDoc = serde_json::from_str(json).context("malformed model artifact")?;
    if doc.version != ARTIFACT_VERSION {
        bail!(
            "unsupported artifact version {} (expected {})",
            doc.version,
            ARTIFACT_VERSION
        );
    }

    let mut slots: Vec<Option<Box<dyn HorizonModel>>> = (0..horizons).map(|_| None).collect();
    for horizon in doc.horizons {
        let step = horizon.step;
        if step == 0 || step > horizons {
            bail!("horizon step {} outside 1..={}", step, horizons);
        }
        let slot = &mut slots[(step - 1) as usize];
        if slot.is_some() {
            bail!("horizon step {} appears more than once", step);
        }
        *slot = Some(build_model(horizon.model, step)?);
    }

    let mut models = Vec::with_capacity(slots.len());
    for (i, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(model) => models.push(model),
            None => bail!("artifact has no model for horizon step {}", i + 1),
        }
    }
    Ok(ModelEnsemble::from_models(models))
}

/// Load an artifact file; paths ending in `.gz` are gunzipped first.
pub fn load_ensemble(path: &Path, horizons: u32) -> anyhow::Result<ModelEnsemble> {
    let file =
        File::open(path).with_context(|| format!("cannot open model artifact {}", path.display()))?;
    let mut text = String::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        let mut file = file;
        file.read_to_string(&mut text)?;
    }
    let ensemble = parse_ensemble(&text, horizons)
        .with_context(|| format!("invalid model artifact {}", path.display()))?;
    log::info!(
        "[AQF] ensemble: loaded {} horizon models from {}",
        ensemble.horizons(),
        path.display()
    );
    Ok(ensemble)
}
