//! Model training
//!
//! Five regressor families behind a single [`Regressor`] dispatch
//! enum, plus k-fold splitting and regression metrics.

pub mod cross_validation;
pub mod decision_tree;
pub mod engine;
pub mod gradient_boosting;
pub mod linear;
pub mod metrics;
pub mod random_forest;
pub mod xgb;

pub use cross_validation::{CVResults, CVSplit, KFold};
pub use decision_tree::DecisionTree;
pub use engine::{design_matrix, feature_columns, target_vector, ModelKind, Regressor};
pub use gradient_boosting::GradientBoosting;
pub use linear::LinearRegression;
pub use metrics::ModelMetrics;
pub use random_forest::{MaxFeatures, RandomForest};
pub use xgb::{XgbConfig, XgbRegressor};
