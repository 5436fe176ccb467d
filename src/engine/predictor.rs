//! 模型檔中的回歸器。
//!
//! 訓練端把 scikit-learn 模型攤平成 JSON：線性模型保留截距與係數，
//! 決策樹保留 CART 陣列（`children_left[i] == -1` 為葉節點），
//! 梯度提升為 baseline 加上 `learning_rate` 乘以各樹輸出總和
//! （未給 `learning_rate` 時視為 1，即葉值已預先乘上收縮係數），
//! 投票集成取成員平均。

use crate::utils::error::PredictorError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predictor {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    Tree(DecisionTree),
    Boosted {
        baseline: f64,
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        trees: Vec<DecisionTree>,
    },
    Voting {
        members: Vec<Predictor>,
    },
}

fn default_learning_rate() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl Predictor {
    /// 單一樣本推論，輸出必須是有限值
    pub fn predict(&self, features: &[f64]) -> Result<f64, PredictorError> {
        let y = self.evaluate(features)?;
        if y.is_finite() {
            Ok(y)
        } else {
            Err(PredictorError::NonFinite)
        }
    }

    fn evaluate(&self, features: &[f64]) -> Result<f64, PredictorError> {
        match self {
            Predictor::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.len() != features.len() {
                    return Err(PredictorError::ShapeMismatch {
                        expected: coefficients.len(),
                        actual: features.len(),
                    });
                }
                Ok(intercept
                    + coefficients
                        .iter()
                        .zip(features)
                        .map(|(c, x)| c * x)
                        .sum::<f64>())
            }
            Predictor::Tree(tree) => tree.predict(features),
            Predictor::Boosted {
                baseline,
                learning_rate,
                trees,
            } => {
                let mut total = 0.0;
                for tree in trees {
                    total += tree.predict(features)?;
                }
                Ok(baseline + learning_rate * total)
            }
            Predictor::Voting { members } => {
                if members.is_empty() {
                    return Err(PredictorError::Malformed(
                        "voting ensemble has no members".to_string(),
                    ));
                }
                let mut total = 0.0;
                for member in members {
                    total += member.evaluate(features)?;
                }
                Ok(total / members.len() as f64)
            }
        }
    }
}

impl DecisionTree {
    pub fn node_count(&self) -> usize {
        self.value.len()
    }

    fn check_shape(&self) -> Result<(), PredictorError> {
        let n = self.value.len();
        if n == 0 {
            return Err(PredictorError::Malformed("tree has no nodes".to_string()));
        }
        if self.children_left.len() != n
            || self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
        {
            return Err(PredictorError::Malformed(format!(
                "tree arrays disagree in length (value has {} nodes)",
                n
            )));
        }
        Ok(())
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, PredictorError> {
        self.check_shape()?;
        let n = self.node_count();
        let mut node = 0usize;

        // 每一步都往下走一層，超過節點數代表陣列中有環
        for _ in 0..n {
            let left = self.children_left[node];
            if left < 0 {
                return Ok(self.value[node]);
            }

            let index = usize::try_from(self.feature[node]).map_err(|_| {
                PredictorError::Malformed(format!("negative feature index at node {}", node))
            })?;
            let x = *features.get(index).ok_or(PredictorError::FeatureIndex {
                index,
                width: features.len(),
            })?;

            let next = if x <= self.threshold[node] {
                left
            } else {
                self.children_right[node]
            };
            node = usize::try_from(next)
                .ok()
                .filter(|&i| i < n)
                .ok_or_else(|| {
                    PredictorError::Malformed(format!("child {} out of range at node {}", next, node))
                })?;
        }

        Err(PredictorError::Malformed("tree contains a cycle".to_string()))
    }
}
