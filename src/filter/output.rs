//! Output filter

use crate::core::Output;
use crate::filter::{equals, from_json, in_set, Filter, FilterError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unvalidated output filter fields; also the filter's JSON shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputFilterBuilder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stealth_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaddress_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaddress_indices: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_spent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_frozen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<u64>,
}

impl OutputFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amount(mut self, v: u64) -> Self {
        self.amount = Some(v);
        self
    }

    pub fn index(mut self, v: u64) -> Self {
        self.index = Some(v);
        self
    }

    pub fn key_image(mut self, v: impl Into<String>) -> Self {
        self.key_image = Some(v.into());
        self
    }

    pub fn stealth_public_key(mut self, v: impl Into<String>) -> Self {
        self.stealth_public_key = Some(v.into());
        self
    }

    pub fn account_index(mut self, v: u32) -> Self {
        self.account_index = Some(v);
        self
    }

    pub fn subaddress_index(mut self, v: u32) -> Self {
        self.subaddress_index = Some(v);
        self
    }

    pub fn subaddress_indices(mut self, v: Vec<u32>) -> Self {
        self.subaddress_indices = Some(v);
        self
    }

    pub fn is_spent(mut self, v: bool) -> Self {
        self.is_spent = Some(v);
        self
    }

    pub fn is_frozen(mut self, v: bool) -> Self {
        self.is_frozen = Some(v);
        self
    }

    pub fn min_amount(mut self, v: u64) -> Self {
        self.min_amount = Some(v);
        self
    }

    pub fn max_amount(mut self, v: u64) -> Self {
        self.max_amount = Some(v);
        self
    }

    pub fn build(self) -> Result<OutputFilter, FilterError> {
        OutputFilter::try_from(self)
    }
}

/// Validated output filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OutputFilterBuilder", into = "OutputFilterBuilder")]
pub struct OutputFilter {
    fields: OutputFilterBuilder,
}

impl TryFrom<OutputFilterBuilder> for OutputFilter {
    type Error = FilterError;

    fn try_from(fields: OutputFilterBuilder) -> Result<Self, Self::Error> {
        if let (Some(min), Some(max)) = (fields.min_amount, fields.max_amount) {
            if min > max {
                return Err(FilterError::invalid(format!(
                    "min_amount {} exceeds max_amount {}",
                    min, max
                )));
            }
        }
        Ok(Self { fields })
    }
}

impl From<OutputFilter> for OutputFilterBuilder {
    fn from(filter: OutputFilter) -> Self {
        filter.fields
    }
}

impl TryFrom<&Value> for OutputFilter {
    type Error = FilterError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        from_json::<OutputFilterBuilder, _>(value)
    }
}

impl OutputFilter {
    pub fn builder() -> OutputFilterBuilder {
        OutputFilterBuilder::new()
    }

    pub fn fields(&self) -> &OutputFilterBuilder {
        &self.fields
    }
}

impl Filter<Output> for OutputFilter {
    fn meets_criteria(&self, output: &Output) -> bool {
        let f = &self.fields;
        if f.min_amount.is_some_and(|min| output.amount.map_or(true, |a| a < min))
            || f.max_amount.is_some_and(|max| output.amount.map_or(true, |a| a > max))
        {
            return false;
        }
        equals(&f.is_spent, output.is_spent.as_ref())
            && equals(&f.is_frozen, output.is_frozen.as_ref())
            && equals(&f.amount, output.amount.as_ref())
            && equals(&f.index, output.index.as_ref())
            && equals(&f.account_index, output.account_index.as_ref())
            && equals(&f.subaddress_index, output.subaddress_index.as_ref())
            && in_set(&f.subaddress_indices, output.subaddress_index.as_ref())
            && equals(&f.key_image, output.key_image.as_ref())
            && equals(&f.stealth_public_key, output.stealth_public_key.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(amount: u64, subaddress: u32, spent: bool) -> Output {
        Output {
            amount: Some(amount),
            account_index: Some(0),
            subaddress_index: Some(subaddress),
            is_spent: Some(spent),
            key_image: Some(format!("ki-{}", amount)),
            ..Default::default()
        }
    }

    #[test]
    fn test_amount_range() {
        let filter = OutputFilter::builder().min_amount(10).max_amount(20).build().unwrap();
        assert!(filter.meets_criteria(&output(10, 0, false)));
        assert!(filter.meets_criteria(&output(20, 0, false)));
        assert!(!filter.meets_criteria(&output(21, 0, false)));
        assert!(!filter.meets_criteria(&Output::default()));
    }

    #[test]
    fn test_template_fields() {
        let filter = OutputFilter::builder().is_spent(false).subaddress_indices(vec![1, 2]).build().unwrap();
        let outputs = vec![output(1, 1, false), output(2, 2, true), output(3, 3, false)];
        let matched = filter.apply(&outputs[..]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].amount, Some(1));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(OutputFilter::builder().min_amount(5).max_amount(4).build().is_err());
        assert!(OutputFilter::try_from(&json!({"min_amount": 5, "max_amount": 4})).is_err());
        assert!(OutputFilter::try_from(&json!({"spent": true})).is_err());
    }
}
