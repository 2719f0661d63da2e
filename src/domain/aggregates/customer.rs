//! Customer Aggregate

use serde::{Deserialize, Serialize};

use super::record::LocalRecord;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool { *self == Self::default() }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerData {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub billing: Address,
    pub shipping: Address,
}

impl CustomerData {
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into(), first_name: None, last_name: None, username: None, billing: Address::default(), shipping: Address::default() }
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(n), None) | (None, Some(n)) => n.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

pub type Customer = LocalRecord<CustomerData>;
