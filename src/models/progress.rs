use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Draft,
    Submitted,
    Reviewed,
    Approved,
    Invoiced,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Reviewed => "reviewed",
            Self::Approved => "approved",
            Self::Invoiced => "invoiced",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "submitted" => Self::Submitted,
            "reviewed" => Self::Reviewed,
            "approved" => Self::Approved,
            "invoiced" => Self::Invoiced,
            _ => Self::Draft,
        }
    }

    /// Only approved reports participate in forecasting; approval is
    /// reachable from submitted or reviewed.
    pub fn can_approve(&self) -> bool {
        matches!(self, Self::Submitted | Self::Reviewed)
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dated snapshot of cumulative completion at (area, system) granularity.
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub id: Option<i64>,
    pub job_id: i64,
    /// Format: "YYYY-MM-DD"
    pub report_date: String,
    pub status: ProgressStatus,
    pub approved_by: String,
    pub approved_at: String,
    pub created_at: String,
}

impl ProgressReport {
    pub fn new(job_id: i64, report_date: String) -> Self {
        Self {
            id: None,
            job_id,
            report_date,
            status: ProgressStatus::Draft,
            approved_by: String::new(),
            approved_at: String::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One (area, system) line of a progress report. CTD values are cumulative,
/// not period deltas; the previous approved CTD is copied forward at
/// creation time so deltas never need a second lookup.
#[derive(Debug, Clone)]
pub struct ProgressLine {
    pub id: Option<i64>,
    pub report_id: i64,
    pub area: String,
    pub system: String,
    pub submitted_ctd_amount: Decimal,
    pub submitted_ctd_percent: Decimal,
    pub approved_ctd_amount: Decimal,
    pub approved_ctd_percent: Decimal,
    pub previous_ctd_amount: Decimal,
}

impl ProgressLine {
    /// Earned this period: the approved CTD delta, floored at zero.
    pub fn earned_this_period(&self) -> Decimal {
        (self.approved_ctd_amount - self.previous_ctd_amount).max(Decimal::ZERO)
    }
}
