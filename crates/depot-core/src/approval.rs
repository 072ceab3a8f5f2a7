//! # Approval Workflow
//!
//! A three-state machine attached to dispatches, invoices and payments.
//!
//! ```text
//!                 policy flag on
//!   create ─────────────────────────► Pending ──approve──► Approved
//!     │                                  │
//!     │ policy flag off                  └──reject───► Rejected
//!     ▼                                                (dispatch/payment
//!   Approved                                            also → cancelled)
//! ```
//!
//! Pending documents are invisible to every projection. Anything other than
//! `pending → approved` or `pending → rejected` is an invalid transition.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::settings::Settings;

// =============================================================================
// Approval Status
// =============================================================================

/// Approval state of a document. Absent in storage means `approved`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ApprovalStatus {
    #[default]
    Approved,
    Pending,
    Rejected,
}

impl ApprovalStatus {
    /// Starting state for a new document.
    pub fn initial(approval_required: bool) -> Self {
        if approval_required {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::Approved
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ApprovalStatus::Pending)
    }

    /// Pending documents have no financial or stock effect.
    pub fn counts_toward_balances(&self) -> bool {
        !self.is_pending()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    /// Applies `action` to this state.
    ///
    /// ## Errors
    /// [`CoreError::InvalidTransition`] unless the document is pending.
    pub fn transition(self, action: ApprovalAction, kind: DocumentKind, id: &str) -> CoreResult<Self> {
        match (self, action) {
            (ApprovalStatus::Pending, ApprovalAction::Approve) => Ok(ApprovalStatus::Approved),
            (ApprovalStatus::Pending, ApprovalAction::Reject) => Ok(ApprovalStatus::Rejected),
            (current, action) => Err(CoreError::InvalidTransition {
                entity: kind.entity_name().to_string(),
                id: id.to_string(),
                current: current.as_str().to_string(),
                action: action.as_str().to_string(),
            }),
        }
    }
}

/// The two explicit approval actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Reject,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Approve => "approve",
            ApprovalAction::Reject => "reject",
        }
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// Document types the approval workflow applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Dispatch,
    Invoice,
    SupplierPayment,
    StorePayment,
}

impl DocumentKind {
    /// Entity name used in audit entries.
    pub fn entity_name(&self) -> &'static str {
        match self {
            DocumentKind::Dispatch => "dispatch",
            DocumentKind::Invoice => "invoice",
            DocumentKind::SupplierPayment => "supplier_payment",
            DocumentKind::StorePayment => "store_payment",
        }
    }

    /// Whether rejecting this kind also forces `status: cancelled`.
    ///
    /// Invoices have no lifecycle status of their own, so only the
    /// approval state changes.
    pub fn cancels_on_rejection(&self) -> bool {
        !matches!(self, DocumentKind::Invoice)
    }
}

// =============================================================================
// Approval Policy
// =============================================================================

/// Which document kinds need explicit approval before they count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPolicy {
    pub require_dispatch_approval: bool,
    pub require_invoice_approval: bool,
    /// Covers both store and supplier payments.
    pub require_payment_approval: bool,
}

impl ApprovalPolicy {
    pub fn requires(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Dispatch => self.require_dispatch_approval,
            DocumentKind::Invoice => self.require_invoice_approval,
            DocumentKind::SupplierPayment | DocumentKind::StorePayment => {
                self.require_payment_approval
            }
        }
    }

    /// Starting approval state for a new document of `kind`.
    pub fn initial_status(&self, kind: DocumentKind) -> ApprovalStatus {
        ApprovalStatus::initial(self.requires(kind))
    }
}

impl From<&Settings> for ApprovalPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            require_dispatch_approval: settings.require_dispatch_approval,
            require_invoice_approval: settings.require_invoice_approval,
            require_payment_approval: settings.require_payment_approval,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
