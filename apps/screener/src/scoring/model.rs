//! Tree Ensemble Model: a native evaluator for gradient-boosted tree artifacts saved in
//! XGBoost's JSON model format.
//!
//! Only what the screening model needs is supported: a `gbtree` booster with a logistic
//! objective. Everything is validated at load time so that evaluation cannot index out
//! of bounds or loop.
//!
//! Evaluation:
//! 1. For each tree, walk from the root: go left when `value < split_condition`, or when
//!    the value is missing (NaN) and the node's `default_left` is set.
//! 2. margin = logit(base_score) + Σ leaf values
//! 3. probability = sigmoid(margin)

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::{Scorer, ScoringError};

const LEAF: i32 = -1;
const SUPPORTED_OBJECTIVES: &[&str] = &["binary:logistic", "reg:logistic"];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported objective '{0}'")]
    UnsupportedObjective(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Artifact layout (only the fields evaluation needs; the rest is ignored)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Artifact {
    learner: RawLearner,
}

#[derive(Debug, Deserialize)]
struct RawLearner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: RawBooster,
    learner_model_param: RawLearnerParam,
    objective: RawObjective,
}

#[derive(Debug, Deserialize)]
struct RawBooster {
    name: String,
    model: Option<RawTreeModel>,
}

#[derive(Debug, Deserialize)]
struct RawTreeModel {
    trees: Vec<RawTree>,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
}

/// Older artifacts write `default_left` as 0/1, newer ones as booleans.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLearnerParam {
    base_score: String,
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct RawObjective {
    name: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Validated model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf_value(&self, values: &[f32]) -> f32 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = values[*feature];
                    let go_left = if value.is_nan() {
                        *default_left
                    } else {
                        value < *threshold
                    };
                    index = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// A loaded, validated tree ensemble. Immutable and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct TreeEnsembleModel {
    trees: Vec<Tree>,
    base_margin: f32,
    num_feature: usize,
    feature_names: Vec<String>,
}

impl TreeEnsembleModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let artifact: Artifact = serde_json::from_str(json)?;
        let learner = artifact.learner;

        if !SUPPORTED_OBJECTIVES.contains(&learner.objective.name.as_str()) {
            return Err(ModelError::UnsupportedObjective(learner.objective.name));
        }
        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelError::Invalid(format!(
                "booster '{}' is not supported, expected 'gbtree'",
                learner.gradient_booster.name
            )));
        }

        let num_feature = parse_num_feature(&learner.learner_model_param.num_feature)?;
        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;

        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_feature {
            return Err(ModelError::Invalid(format!(
                "{} feature names for {} features",
                learner.feature_names.len(),
                num_feature
            )));
        }

        let raw_trees = learner
            .gradient_booster
            .model
            .map(|m| m.trees)
            .unwrap_or_default();
        if raw_trees.is_empty() {
            return Err(ModelError::Invalid("model has no trees".to_string()));
        }

        let trees = raw_trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| build_tree(raw, num_feature).map_err(|e| tree_error(i, e)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            base_margin: logit(base_score),
            num_feature,
            feature_names: learner.feature_names,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    /// Probability for an already-checked input of width `num_feature`.
    fn predict_probability(&self, values: &[f32]) -> f32 {
        let margin = self
            .trees
            .iter()
            .fold(self.base_margin, |acc, tree| acc + tree.leaf_value(values));
        sigmoid(margin)
    }

    fn check_input(&self, values: &[f32], names: &[&str]) -> Result<(), ScoringError> {
        if values.len() != self.num_feature {
            return Err(ScoringError::WidthMismatch {
                expected: self.num_feature,
                actual: values.len(),
            });
        }
        if !self.feature_names.is_empty() {
            if names.len() != self.feature_names.len() {
                return Err(ScoringError::WidthMismatch {
                    expected: self.feature_names.len(),
                    actual: names.len(),
                });
            }
            for (position, (expected, actual)) in
                self.feature_names.iter().zip(names).enumerate()
            {
                if expected != actual {
                    return Err(ScoringError::FeatureNameMismatch {
                        position,
                        expected: expected.clone(),
                        actual: actual.to_string(),
                    });
                }
            }
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ScoringError::NonFiniteValue {
                name: names
                    .get(i)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("#{i}")),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Scorer for TreeEnsembleModel {
    async fn score(&self, values: &[f32], names: &[&str]) -> Result<f32, ScoringError> {
        self.check_input(values, names)?;
        let probability = self.predict_probability(values);
        if probability.is_nan() {
            return Err(ScoringError::Backend(
                "tree ensemble produced a NaN margin".to_string(),
            ));
        }
        Ok(probability)
    }
}

fn build_tree(raw: RawTree, num_feature: usize) -> Result<Tree, String> {
    let len = raw.left_children.len();
    if len == 0 {
        return Err("tree has no nodes".to_string());
    }
    if raw.right_children.len() != len
        || raw.split_indices.len() != len
        || raw.split_conditions.len() != len
        || raw.default_left.len() != len
    {
        return Err("node arrays have different lengths".to_string());
    }

    let mut nodes = Vec::with_capacity(len);
    for index in 0..len {
        let left = raw.left_children[index];
        let right = raw.right_children[index];

        if left == LEAF {
            if right != LEAF {
                return Err(format!("node {index} has only a right child"));
            }
            nodes.push(Node::Leaf(raw.split_conditions[index]));
            continue;
        }

        // Children always come after their parent; this also rules out cycles.
        let child = |c: i32| -> Result<usize, String> {
            usize::try_from(c)
                .ok()
                .filter(|&c| c > index && c < len)
                .ok_or_else(|| format!("node {index} has invalid child {c}"))
        };
        let feature = raw.split_indices[index] as usize;
        if feature >= num_feature {
            return Err(format!(
                "node {index} splits on feature {feature}, model has {num_feature}"
            ));
        }

        nodes.push(Node::Split {
            feature,
            threshold: raw.split_conditions[index],
            left: child(left)?,
            right: child(right)?,
            default_left: raw.default_left[index].is_set(),
        });
    }

    Ok(Tree { nodes })
}

fn tree_error(index: usize, reason: String) -> ModelError {
    ModelError::Invalid(format!("tree {index}: {reason}"))
}

fn parse_num_feature(raw: &str) -> Result<usize, ModelError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ModelError::Invalid(format!("num_feature '{raw}' is not a positive integer")))
}

/// Accepts both `"5E-1"` and the bracketed `"[5E-1]"` form.
fn parse_base_score(raw: &str) -> Result<f32, ModelError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|&p| p > 0.0 && p < 1.0)
        .ok_or_else(|| ModelError::Invalid(format!("base_score '{raw}' is not in (0, 1)")))
}

fn logit(p: f32) -> f32 {
    (p / (1.0 - p)).ln()
}

fn sigmoid(margin: f32) -> f32 {
    1.0 / (1.0 + (-margin).exp())
}
