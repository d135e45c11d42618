//! Categorical encoding fitted on training data
//!
//! Three schemes, chosen per column at fit time:
//! - declared ordinal columns map ranked categories to integers
//! - low-cardinality columns are one-hot encoded
//! - everything else is target encoded with the training target mean

use crate::error::{DemandError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Encoding scheme selected for a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EncodeMethod {
    OneHot,
    Target,
    Ordinal,
}

/// Encoder for categorical columns
///
/// All mappings are learned at fit time and reused verbatim on later
/// frames, so train and test produce identical output schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoder {
    max_onehot_cardinality: usize,
    ordinal_orders: HashMap<String, Vec<String>>,
    ordinal_unknown_sentinel: Option<i32>,
    /// Column and method, in fit order; transform follows this order so
    /// output columns land deterministically
    methods: Vec<(String, EncodeMethod)>,
    onehot_categories: HashMap<String, Vec<String>>,
    target_means: HashMap<String, HashMap<String, f64>>,
    global_mean: f64,
    is_fitted: bool,
}

impl CategoryEncoder {
    pub fn new(max_onehot_cardinality: usize) -> Self {
        Self {
            max_onehot_cardinality,
            ordinal_orders: HashMap::new(),
            ordinal_unknown_sentinel: None,
            methods: Vec::new(),
            onehot_categories: HashMap::new(),
            target_means: HashMap::new(),
            global_mean: 0.0,
            is_fitted: false,
        }
    }

    /// Declare ranked category orders for ordinal columns
    pub fn with_ordinal_orders(mut self, orders: HashMap<String, Vec<String>>) -> Self {
        self.ordinal_orders = orders;
        self
    }

    /// Encode unseen ordinal categories as a sentinel instead of erroring
    pub fn with_ordinal_unknown_sentinel(mut self, sentinel: Option<i32>) -> Self {
        self.ordinal_unknown_sentinel = sentinel;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Methods decided at fit time, in fit order
    pub fn methods(&self) -> &[(String, EncodeMethod)] {
        &self.methods
    }

    /// Learn encodings for the given columns
    ///
    /// The target is only used for target-encoded columns; it must align
    /// row-for-row with `df`.
    pub fn fit_with_target(
        &mut self,
        df: &DataFrame,
        columns: &[&str],
        target: &Series,
    ) -> Result<&mut Self> {
        if target.len() != df.height() {
            return Err(DemandError::ShapeError {
                expected: format!("target with {} rows", df.height()),
                actual: format!("{} rows", target.len()),
            });
        }

        self.methods.clear();
        self.onehot_categories.clear();
        self.target_means.clear();

        let target_f64 = target.cast(&DataType::Float64)?;
        let target_ca = target_f64.f64()?;

        let target_sum: f64 = target_ca.into_iter().flatten().sum();
        let target_count = target_ca.len() - target_ca.null_count();
        if target_count == 0 {
            return Err(DemandError::PreprocessingError(
                "target column has no values".to_string(),
            ));
        }
        self.global_mean = target_sum / target_count as f64;

        for &name in columns {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.to_string()))?;
            let ca = col.str().map_err(|_| {
                DemandError::PreprocessingError(format!(
                    "cannot encode non-string column '{}'",
                    name
                ))
            })?;

            let categories = distinct_in_order(ca);
            if categories.is_empty() {
                return Err(DemandError::PreprocessingError(format!(
                    "categorical column '{}' has no values",
                    name
                )));
            }

            if let Some(order) = self.ordinal_orders.get(name) {
                for cat in &categories {
                    if !order.contains(cat) {
                        return Err(DemandError::PreprocessingError(format!(
                            "ordinal column '{}' contains category '{}' not in its declared order",
                            name, cat
                        )));
                    }
                }
                self.methods.push((name.to_string(), EncodeMethod::Ordinal));
            } else if categories.len() <= self.max_onehot_cardinality {
                self.onehot_categories.insert(name.to_string(), categories);
                self.methods.push((name.to_string(), EncodeMethod::OneHot));
            } else {
                let means = category_target_means(ca, target_ca);
                self.target_means.insert(name.to_string(), means);
                self.methods.push((name.to_string(), EncodeMethod::Target));
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Encode fitted columns, replacing them with numeric outputs
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }

        let mut df = df.clone();

        for (name, method) in &self.methods {
            let ca = {
                let col = df
                    .column(name)
                    .map_err(|_| DemandError::ColumnNotFound(name.clone()))?;
                col.str()
                    .map_err(|_| {
                        DemandError::PreprocessingError(format!(
                            "cannot encode non-string column '{}'",
                            name
                        ))
                    })?
                    .clone()
            };

            match method {
                EncodeMethod::OneHot => {
                    df = self.transform_onehot(df, name, &ca)?;
                }
                EncodeMethod::Target => {
                    let means = &self.target_means[name];
                    let encoded: Float64Chunked = (&ca)
                        .into_iter()
                        .map(|opt| {
                            Some(match opt {
                                Some(cat) => *means.get(cat).unwrap_or(&self.global_mean),
                                None => self.global_mean,
                            })
                        })
                        .collect();
                    df.with_column(encoded.with_name(name.as_str().into()).into_series())?;
                }
                EncodeMethod::Ordinal => {
                    let order = &self.ordinal_orders[name];
                    let mut ranks: Vec<Option<i32>> = Vec::with_capacity(ca.len());
                    for opt in (&ca).into_iter() {
                        let rank = match opt {
                            Some(cat) => match order.iter().position(|o| o == cat) {
                                Some(idx) => Some(idx as i32),
                                None => match self.ordinal_unknown_sentinel {
                                    Some(s) => Some(s),
                                    None => {
                                        return Err(DemandError::PreprocessingError(format!(
                                            "unseen category '{}' in ordinal column '{}'",
                                            cat, name
                                        )))
                                    }
                                },
                            },
                            None => match self.ordinal_unknown_sentinel {
                                Some(s) => Some(s),
                                None => {
                                    return Err(DemandError::PreprocessingError(format!(
                                        "missing value in ordinal column '{}'",
                                        name
                                    )))
                                }
                            },
                        };
                        ranks.push(rank);
                    }
                    let encoded: Int32Chunked = ranks.into_iter().collect();
                    df.with_column(encoded.with_name(name.as_str().into()).into_series())?;
                }
            }
        }

        Ok(df)
    }

    fn transform_onehot(
        &self,
        mut df: DataFrame,
        name: &str,
        ca: &StringChunked,
    ) -> Result<DataFrame> {
        let categories = &self.onehot_categories[name];

        for cat in categories {
            // Unseen and missing values encode as all zeros
            let indicator: Int32Chunked = ca
                .into_iter()
                .map(|opt| Some(i32::from(opt == Some(cat.as_str()))))
                .collect();
            df.with_column(
                indicator
                    .with_name(format!("{}_{}", name, cat).into())
                    .into_series(),
            )?;
        }

        Ok(df.drop(name)?)
    }
}

/// Distinct non-null values in first-appearance order
fn distinct_in_order(ca: &StringChunked) -> Vec<String> {
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    let mut out = Vec::new();
    for v in ca.into_iter().flatten() {
        if seen.insert(v) {
            out.push(v.to_string());
        }
    }
    out
}

/// Mean target value per category
fn category_target_means(ca: &StringChunked, target: &Float64Chunked) -> HashMap<String, f64> {
    let mut sums: HashMap<&str, f64> = HashMap::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for (cat, y) in ca.into_iter().zip(target.into_iter()) {
        if let (Some(cat), Some(y)) = (cat, y) {
            *sums.entry(cat).or_insert(0.0) += y;
            *counts.entry(cat).or_insert(0) += 1;
        }
    }

    sums.into_iter()
        .map(|(cat, sum)| (cat.to_string(), sum / counts[cat] as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> CategoryEncoder {
        let mut orders = HashMap::new();
        orders.insert(
            "loyalty".to_string(),
            vec![
                "Bronze".to_string(),
                "Silver".to_string(),
                "Gold".to_string(),
            ],
        );
        CategoryEncoder::new(3).with_ordinal_orders(orders)
    }

    fn train_df() -> DataFrame {
        df!(
            "store" => &["north", "south", "north", "east"],
            "product" => &["p1", "p2", "p3", "p4"],
            "loyalty" => &["Bronze", "Gold", "Silver", "Bronze"],
        )
        .unwrap()
    }

    fn target() -> Series {
        Series::new("demand".into(), &[10.0f64, 20.0, 30.0, 40.0])
    }

    #[test]
    fn test_method_selection() {
        let df = train_df();
        let mut enc = encoder();
        enc.fit_with_target(&df, &["store", "product", "loyalty"], &target())
            .unwrap();

        let methods: HashMap<&str, EncodeMethod> = enc
            .methods()
            .iter()
            .map(|(n, m)| (n.as_str(), *m))
            .collect();

        // 3 distinct stores fits one-hot, 4 products exceeds the limit
        assert_eq!(methods["store"], EncodeMethod::OneHot);
        assert_eq!(methods["product"], EncodeMethod::Target);
        assert_eq!(methods["loyalty"], EncodeMethod::Ordinal);
    }

    #[test]
    fn test_onehot_columns() {
        let df = train_df();
        let mut enc = encoder();
        enc.fit_with_target(&df, &["store"], &target()).unwrap();
        let out = enc.transform(&df).unwrap();

        let names: Vec<String> = out
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert!(names.contains(&"store_north".to_string()));
        assert!(names.contains(&"store_south".to_string()));
        assert!(names.contains(&"store_east".to_string()));
        assert!(!names.contains(&"store".to_string()));

        let north = out.column("store_north").unwrap().i32().unwrap();
        assert_eq!(north.get(0), Some(1));
        assert_eq!(north.get(1), Some(0));
    }

    #[test]
    fn test_onehot_unseen_category_is_all_zeros() {
        let df = train_df();
        let mut enc = encoder();
        enc.fit_with_target(&df, &["store"], &target()).unwrap();

        let test = df!(
            "store" => &["west"],
            "product" => &["p1"],
            "loyalty" => &["Bronze"],
        )
        .unwrap();
        let out = enc.transform(&test).unwrap();

        for col in ["store_north", "store_south", "store_east"] {
            assert_eq!(out.column(col).unwrap().i32().unwrap().get(0), Some(0));
        }
    }

    #[test]
    fn test_target_encoding_means() {
        let df = df!(
            "product" => &["a", "a", "b", "b", "c", "d", "e"],
        )
        .unwrap();
        let y = Series::new("y".into(), &[1.0f64, 3.0, 10.0, 20.0, 5.0, 6.0, 7.0]);

        let mut enc = CategoryEncoder::new(3);
        enc.fit_with_target(&df, &["product"], &y).unwrap();
        let out = enc.transform(&df).unwrap();

        let encoded = out.column("product").unwrap().f64().unwrap();
        assert_eq!(encoded.get(0), Some(2.0));
        assert_eq!(encoded.get(2), Some(15.0));
    }

    #[test]
    fn test_target_encoding_unseen_uses_global_mean() {
        let df = df!("product" => &["a", "a", "b", "b", "c", "d", "e"]).unwrap();
        let y = Series::new("y".into(), &[1.0f64, 3.0, 10.0, 20.0, 5.0, 6.0, 7.0]);

        let mut enc = CategoryEncoder::new(3);
        enc.fit_with_target(&df, &["product"], &y).unwrap();

        let test = df!("product" => &["zzz"]).unwrap();
        let out = enc.transform(&test).unwrap();

        let expected = (1.0 + 3.0 + 10.0 + 20.0 + 5.0 + 6.0 + 7.0) / 7.0;
        let encoded = out.column("product").unwrap().f64().unwrap();
        assert!((encoded.get(0).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ordinal_encoding() {
        let df = train_df();
        let mut enc = encoder();
        enc.fit_with_target(&df, &["loyalty"], &target()).unwrap();
        let out = enc.transform(&df).unwrap();

        let loyalty = out.column("loyalty").unwrap().i32().unwrap();
        assert_eq!(loyalty.get(0), Some(0));
        assert_eq!(loyalty.get(1), Some(2));
        assert_eq!(loyalty.get(2), Some(1));
    }

    #[test]
    fn test_ordinal_unseen_errors_by_default() {
        let df = train_df();
        let mut enc = encoder();
        enc.fit_with_target(&df, &["loyalty"], &target()).unwrap();

        let test = df!("loyalty" => &["Platinum"]).unwrap();
        assert!(enc.transform(&test).is_err());
    }

    #[test]
    fn test_ordinal_unseen_sentinel() {
        let df = train_df();
        let mut enc = encoder().with_ordinal_unknown_sentinel(Some(-1));
        enc.fit_with_target(&df, &["loyalty"], &target()).unwrap();

        let test = df!("loyalty" => &["Platinum"]).unwrap();
        let out = enc.transform(&test).unwrap();
        assert_eq!(out.column("loyalty").unwrap().i32().unwrap().get(0), Some(-1));
    }

    #[test]
    fn test_fit_rejects_undeclared_ordinal_category() {
        let df = df!("loyalty" => &["Bronze", "Platinum"]).unwrap();
        let y = Series::new("y".into(), &[1.0f64, 2.0]);
        let mut enc = encoder();
        assert!(enc.fit_with_target(&df, &["loyalty"], &y).is_err());
    }

    #[test]
    fn test_identical_schema_for_train_and_test() {
        let df = train_df();
        let mut enc = encoder();
        enc.fit_with_target(&df, &["store", "product", "loyalty"], &target())
            .unwrap();

        let test = df!(
            "store" => &["west", "north"],
            "product" => &["p9", "p1"],
            "loyalty" => &["Gold", "Silver"],
        )
        .unwrap();

        let train_out = enc.transform(&df).unwrap();
        let test_out = enc.transform(&test).unwrap();

        let train_names: Vec<String> = train_out
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let test_names: Vec<String> = test_out
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(train_names, test_names);
    }
}
