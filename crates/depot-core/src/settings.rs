//! # Business Settings
//!
//! Settings live in the document store as a flat key → value map. This module
//! gives them a typed shape and converts in both directions.
//!
//! | Key                       | Type   | Default        |
//! |---------------------------|--------|----------------|
//! | `storeName`               | string | `"Depot"`      |
//! | `printerSize`             | string | `"80mm"`       |
//! | `requireDispatchApproval` | bool   | `false`        |
//! | `requirePaymentApproval`  | bool   | `false`        |
//! | `requireInvoiceApproval`  | bool   | `false`        |
//!
//! Unknown keys are kept in [`Settings::extra`] so a round trip never drops
//! anything the UI collaborator stored.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::approval::ApprovalPolicy;

pub const KEY_STORE_NAME: &str = "storeName";
pub const KEY_PRINTER_SIZE: &str = "printerSize";
pub const KEY_REQUIRE_DISPATCH_APPROVAL: &str = "requireDispatchApproval";
pub const KEY_REQUIRE_PAYMENT_APPROVAL: &str = "requirePaymentApproval";
pub const KEY_REQUIRE_INVOICE_APPROVAL: &str = "requireInvoiceApproval";

/// Typed view of the settings map.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub store_name: String,
    pub printer_size: String,
    pub require_dispatch_approval: bool,
    pub require_payment_approval: bool,
    pub require_invoice_approval: bool,
    pub extra: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_name: "Depot".to_string(),
            printer_size: "80mm".to_string(),
            require_dispatch_approval: false,
            require_payment_approval: false,
            require_invoice_approval: false,
            extra: BTreeMap::new(),
        }
    }
}

/// Flags were stored as booleans, `"true"`/`"false"` strings and 0/1 over time.
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

impl Settings {
    /// Builds settings from the stored map. Missing or malformed values fall
    /// back to defaults.
    pub fn from_map(map: &BTreeMap<String, Value>) -> Self {
        let mut settings = Settings::default();

        for (key, value) in map {
            match key.as_str() {
                KEY_STORE_NAME => {
                    if let Some(s) = value.as_str() {
                        settings.store_name = s.to_string();
                    }
                }
                KEY_PRINTER_SIZE => {
                    if let Some(s) = value.as_str() {
                        settings.printer_size = s.to_string();
                    }
                }
                KEY_REQUIRE_DISPATCH_APPROVAL => {
                    settings.require_dispatch_approval = flag(value).unwrap_or(false);
                }
                KEY_REQUIRE_PAYMENT_APPROVAL => {
                    settings.require_payment_approval = flag(value).unwrap_or(false);
                }
                KEY_REQUIRE_INVOICE_APPROVAL => {
                    settings.require_invoice_approval = flag(value).unwrap_or(false);
                }
                _ => {
                    settings.extra.insert(key.clone(), value.clone());
                }
            }
        }

        settings
    }

    /// Flattens back to the stored map.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = self.extra.clone();
        map.insert(KEY_STORE_NAME.to_string(), Value::from(self.store_name.clone()));
        map.insert(KEY_PRINTER_SIZE.to_string(), Value::from(self.printer_size.clone()));
        map.insert(
            KEY_REQUIRE_DISPATCH_APPROVAL.to_string(),
            Value::from(self.require_dispatch_approval),
        );
        map.insert(
            KEY_REQUIRE_PAYMENT_APPROVAL.to_string(),
            Value::from(self.require_payment_approval),
        );
        map.insert(
            KEY_REQUIRE_INVOICE_APPROVAL.to_string(),
            Value::from(self.require_invoice_approval),
        );
        map
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::from(self)
    }
}
