//! Transfer filter

use crate::core::{IncomingTransfer, OutgoingTransfer, TransferRef};
use crate::filter::{equals, from_json, in_set, Filter, FilterError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unvalidated transfer filter fields; also the filter's JSON shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferFilterBuilder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_incoming: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_outgoing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaddress_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaddress_indices: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_destinations: Option<bool>,
}

impl TransferFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_incoming(mut self, v: bool) -> Self {
        self.is_incoming = Some(v);
        self
    }

    pub fn is_outgoing(mut self, v: bool) -> Self {
        self.is_outgoing = Some(v);
        self
    }

    pub fn amount(mut self, v: u64) -> Self {
        self.amount = Some(v);
        self
    }

    pub fn account_index(mut self, v: u32) -> Self {
        self.account_index = Some(v);
        self
    }

    pub fn address(mut self, v: impl Into<String>) -> Self {
        self.address = Some(v.into());
        self
    }

    pub fn addresses(mut self, v: Vec<String>) -> Self {
        self.addresses = Some(v);
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

    pub fn has_destinations(mut self, v: bool) -> Self {
        self.has_destinations = Some(v);
        self
    }

    pub fn build(self) -> Result<TransferFilter, FilterError> {
        TransferFilter::try_from(self)
    }
}

/// Validated transfer filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransferFilterBuilder", into = "TransferFilterBuilder")]
pub struct TransferFilter {
    fields: TransferFilterBuilder,
}

impl TryFrom<TransferFilterBuilder> for TransferFilter {
    type Error = FilterError;

    fn try_from(fields: TransferFilterBuilder) -> Result<Self, Self::Error> {
        if fields.is_incoming == Some(true) && fields.is_outgoing == Some(true) {
            return Err(FilterError::invalid(
                "transfer cannot be required to be both incoming and outgoing",
            ));
        }
        if fields.has_destinations == Some(true) && fields.is_incoming == Some(true) {
            return Err(FilterError::invalid("incoming transfers never have destinations"));
        }
        Ok(Self { fields })
    }
}

impl From<TransferFilter> for TransferFilterBuilder {
    fn from(filter: TransferFilter) -> Self {
        filter.fields
    }
}

impl TryFrom<&Value> for TransferFilter {
    type Error = FilterError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        from_json::<TransferFilterBuilder, _>(value)
    }
}

impl TransferFilter {
    pub fn builder() -> TransferFilterBuilder {
        TransferFilterBuilder::new()
    }

    /// Filter fields as set
    pub fn fields(&self) -> &TransferFilterBuilder {
        &self.fields
    }

    fn incoming_matches(&self, t: &IncomingTransfer) -> bool {
        let f = &self.fields;
        equals(&f.address, t.address.as_ref())
            && in_set(&f.addresses, t.address.as_ref())
            && equals(&f.subaddress_index, t.subaddress_index.as_ref())
            && in_set(&f.subaddress_indices, t.subaddress_index.as_ref())
            && f.has_destinations != Some(true)
    }

    fn outgoing_matches(&self, t: &OutgoingTransfer) -> bool {
        let f = &self.fields;
        if let Some(address) = &f.address {
            if !t.addresses.as_ref().is_some_and(|a| a.contains(address)) {
                return false;
            }
        }
        if let Some(wanted) = &f.addresses {
            if !t.addresses.as_ref().is_some_and(|a| a.iter().any(|x| wanted.contains(x))) {
                return false;
            }
        }
        if let Some(index) = &f.subaddress_index {
            if !t.subaddress_indices.as_ref().is_some_and(|s| s.contains(index)) {
                return false;
            }
        }
        if let Some(wanted) = &f.subaddress_indices {
            if !t
                .subaddress_indices
                .as_ref()
                .is_some_and(|s| s.iter().any(|x| wanted.contains(x)))
            {
                return false;
            }
        }
        match f.has_destinations {
            Some(required) => t.destinations.is_some() == required,
            None => true,
        }
    }
}

impl<'a> Filter<TransferRef<'a>> for TransferFilter {
    fn meets_criteria(&self, transfer: &TransferRef<'a>) -> bool {
        let f = &self.fields;
        let incoming = transfer.is_incoming();
        if f.is_incoming.is_some_and(|v| v != incoming) || f.is_outgoing.is_some_and(|v| v == incoming) {
            return false;
        }
        if !equals(&f.amount, transfer.amount().as_ref())
            || !equals(&f.account_index, transfer.account_index().as_ref())
        {
            return false;
        }
        match transfer {
            TransferRef::Incoming(t) => self.incoming_matches(t),
            TransferRef::Outgoing(t) => self.outgoing_matches(t),
        }
    }
}

impl Filter<IncomingTransfer> for TransferFilter {
    fn meets_criteria(&self, transfer: &IncomingTransfer) -> bool {
        self.meets_criteria(&TransferRef::Incoming(transfer))
    }
}

impl Filter<OutgoingTransfer> for TransferFilter {
    fn meets_criteria(&self, transfer: &OutgoingTransfer) -> bool {
        self.meets_criteria(&TransferRef::Outgoing(transfer))
    }
}
