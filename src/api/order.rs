use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Order`].
///
/// See [RFC 8555 §7.1.3].
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

impl OrderStatus {
    /// Returns true for `valid` and `invalid`, which the server never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Valid | OrderStatus::Invalid)
    }
}

/// A request for one certificate, tracked by the server from creation to issuance.
///
/// The same type is posted to `newOrder` (identifiers only) and read back on every refresh.
///
/// See [RFC 8555 §7.1.3].
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    pub identifiers: Vec<api::Identifier>,

    /// Requested `notBefore` of the certificate.
    ///
    /// Uses RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,

    /// Requested `notAfter` of the certificate.
    ///
    /// Uses RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<api::Problem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizations: Option<Vec<String>>,

    /// Empty on the newOrder request, where the client does not know it yet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub finalize: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl Order {
    pub(crate) fn from_identifiers(identifiers: Vec<api::Identifier>) -> Self {
        Self {
            identifiers,
            ..Default::default()
        }
    }

    /// Returns true if the order is in `status`.
    pub fn is_status(&self, status: OrderStatus) -> bool {
        self.status == Some(status)
    }

    /// Returns all domains associated with this order.
    pub fn domains(&self) -> Vec<&str> {
        self.identifiers
            .iter()
            .map(|identifier| identifier.value.as_str())
            .collect()
    }

    // Let's Encrypt was observed to return domains in alternate order which
    // may flip primary with SAN(s).
    //
    // This overwrites self without changing the order of the domains.
    pub(crate) fn overwrite(&mut self, mut from_api: Self) -> crate::Result<()> {
        // Make sure the lists are the same.
        if from_api.identifiers.len() != self.identifiers.len()
            || from_api
                .identifiers
                .iter()
                .any(|id| !self.identifiers.contains(id))
        {
            return Err(crate::Error::MalformedResponse(format!(
                "order domain(s) mismatch: had {:?} and got {:?}",
                self.identifiers, from_api.identifiers
            )));
        }
        // Then preserve the original order.
        from_api.identifiers = std::mem::take(&mut self.identifiers);
        *self = from_api;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_payload_omits_server_fields() {
        let order = Order::from_identifiers(vec![api::Identifier::dns("a.example.com")]);
        let json = serde_json::to_string(&order).unwrap();
        assert_eq!(
            json,
            r#"{"identifiers":[{"type":"dns","value":"a.example.com"}]}"#
        );
    }

    #[test]
    fn test_overwrite_keeps_request_order() {
        let mut order = Order::from_identifiers(vec![
            api::Identifier::dns("a.example.com"),
            api::Identifier::dns("b.example.com"),
        ]);

        let from_api = Order {
            status: Some(OrderStatus::Pending),
            identifiers: vec![
                api::Identifier::dns("b.example.com"),
                api::Identifier::dns("a.example.com"),
            ],
            finalize: "https://example.com/finalize/1".to_owned(),
            ..Default::default()
        };

        order.overwrite(from_api).unwrap();
        assert_eq!(order.domains(), ["a.example.com", "b.example.com"]);
        assert!(order.is_status(OrderStatus::Pending));
        assert_eq!(order.finalize, "https://example.com/finalize/1");

        let mismatched = Order {
            identifiers: vec![api::Identifier::dns("c.example.com")],
            ..Default::default()
        };
        assert!(order.overwrite(mismatched).is_err());
    }
}
