use super::{fold_key, MapContext, SyncEntity};
use crate::domain::aggregates::{Address, CustomerData};
use crate::domain::value_objects::non_empty;
use crate::remote::models::{CustomerPayload, WcAddress, WcCustomer};
use crate::EntityKind;

pub struct Customers;

impl SyncEntity for Customers {
    const KIND: EntityKind = EntityKind::Customer;
    type Data = CustomerData;
    type Remote = WcCustomer;
    type Payload = CustomerPayload;

    fn to_remote(data: &CustomerData, _ctx: &MapContext) -> CustomerPayload {
        CustomerPayload {
            email: data.email.clone(),
            first_name: data.first_name.clone().unwrap_or_default(),
            last_name: data.last_name.clone().unwrap_or_default(),
            username: data.username.clone(),
            billing: address_to_remote(&data.billing),
            shipping: address_to_remote(&data.shipping),
        }
    }

    /// Usernames cannot be changed once the remote account exists.
    fn to_remote_update(data: &CustomerData, ctx: &MapContext) -> CustomerPayload {
        CustomerPayload { username: None, ..Self::to_remote(data, ctx) }
    }

    fn to_local(remote: &WcCustomer, _ctx: &MapContext) -> CustomerData {
        CustomerData {
            email: remote.email.trim().to_string(),
            first_name: non_empty(&remote.first_name),
            last_name: non_empty(&remote.last_name),
            username: non_empty(&remote.username),
            billing: address_to_local(&remote.billing),
            shipping: address_to_local(&remote.shipping),
        }
    }

    fn label(data: &CustomerData) -> String { data.email.clone() }

    fn natural_key(data: &CustomerData) -> Option<String> { fold_key(&data.email) }

    fn remote_natural_key(remote: &WcCustomer) -> Option<String> { fold_key(&remote.email) }
}

pub(crate) fn address_to_local(a: &WcAddress) -> Address {
    Address {
        first_name: non_empty(&a.first_name),
        last_name: non_empty(&a.last_name),
        company: non_empty(&a.company),
        street1: non_empty(&a.address_1),
        street2: non_empty(&a.address_2),
        city: non_empty(&a.city),
        state: non_empty(&a.state),
        zip: non_empty(&a.postcode),
        country: non_empty(&a.country),
        email: a.email.as_deref().and_then(non_empty),
        phone: a.phone.as_deref().and_then(non_empty),
    }
}

pub(crate) fn address_to_remote(a: &Address) -> WcAddress {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    WcAddress {
        first_name: text(&a.first_name),
        last_name: text(&a.last_name),
        company: text(&a.company),
        address_1: text(&a.street1),
        address_2: text(&a.street2),
        city: text(&a.city),
        state: text(&a.state),
        postcode: text(&a.zip),
        country: text(&a.country),
        email: a.email.clone(),
        phone: a.phone.clone(),
    }
}
