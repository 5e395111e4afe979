use rust_decimal::Decimal;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaborStatus {
    Pending,
    Approved,
    Rejected,
}

impl LaborStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for LaborStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An approved-time cost record: one worker-day against one cost code,
/// total cost includes labor burden.
#[derive(Debug, Clone)]
pub struct LaborEntry {
    pub id: Option<i64>,
    pub job_id: i64,
    pub worker: String,
    /// Format: "YYYY-MM-DD"
    pub work_date: String,
    pub status: LaborStatus,
    pub cost_code: String,
    /// Direct Schedule of Values reference, when the timekeeping system
    /// captured one.
    pub budget_line_id: Option<i64>,
    /// Area/system tags, empty when the entry carries none.
    pub area: String,
    pub system: String,
    pub hours: Decimal,
    pub total_cost: Decimal,
    pub import_hash: String,
    pub created_at: String,
}

impl LaborEntry {
    pub fn is_approved(&self) -> bool {
        self.status == LaborStatus::Approved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Open,
    Approved,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Approved => "approved",
            Self::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "approved" => Self::Approved,
            "paid" => Self::Paid,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A vendor invoice. Cost detail lives in its allocations.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub id: Option<i64>,
    pub job_id: i64,
    pub vendor: String,
    pub invoice_number: String,
    /// Format: "YYYY-MM-DD"
    pub invoice_date: String,
    pub status: InvoiceStatus,
    pub total_amount: Decimal,
    pub import_hash: String,
    pub created_at: String,
}

impl Invoice {
    /// Allocation amounts must reconcile to the invoice total within one cent.
    pub fn validate_allocations(&self, allocations: &[InvoiceAllocation]) -> Result<(), EngineError> {
        let allocated: Decimal = allocations.iter().map(|a| a.amount).sum();
        let tolerance = Decimal::new(1, 2);
        if (allocated - self.total_amount).abs() > tolerance {
            return Err(EngineError::AllocationMismatch {
                allocated,
                total: self.total_amount,
            });
        }
        Ok(())
    }
}

/// One cost-code slice of an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceAllocation {
    pub id: Option<i64>,
    pub invoice_id: i64,
    pub cost_code: String,
    /// Direct Schedule of Values reference; frequently absent in AP data.
    pub budget_line_id: Option<i64>,
    pub area: String,
    pub system: String,
    pub amount: Decimal,
}
