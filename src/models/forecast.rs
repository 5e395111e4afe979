use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastStatus {
    /// Synthesized on the fly for a period nobody has saved yet; never persisted.
    NotCreated,
    Draft,
    Submitted,
    Approved,
}

impl ForecastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotCreated => "not_created",
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "submitted" => Self::Submitted,
            "approved" => Self::Approved,
            "not_created" => Self::NotCreated,
            _ => Self::Draft,
        }
    }

    pub fn can_transition_to(&self, to: ForecastStatus) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Submitted) | (Self::Submitted, Self::Approved)
        )
    }
}

impl std::fmt::Display for ForecastStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cost-variance classification for a budget group or whole project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BudgetHealth {
    #[default]
    OnBudget,
    AtRisk,
    OverBudget,
}

impl BudgetHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnBudget => "on_budget",
            Self::AtRisk => "at_risk",
            Self::OverBudget => "over_budget",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "at_risk" => Self::AtRisk,
            "over_budget" => Self::OverBudget,
            _ => Self::OnBudget,
        }
    }
}

impl std::fmt::Display for BudgetHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The full EVM metric set cached on a saved forecast.
///
/// `cost_to_date`, `earned_to_date` and `cpi` are re-derived from live data
/// on every write; the rest is accepted from the caller (a human override of
/// the extrapolation is legitimate).
#[derive(Debug, Clone, Default)]
pub struct ForecastSummary {
    pub budget_cost: Decimal,
    pub budget_value: Decimal,
    pub cost_to_date: Decimal,
    pub earned_to_date: Decimal,
    pub planned_value: Decimal,
    pub percent_complete: Decimal,
    pub cost_variance: Decimal,
    pub schedule_variance: Decimal,
    pub cpi: Decimal,
    pub spi: Decimal,
    pub eac: Decimal,
    pub etc: Decimal,
    pub vac: Decimal,
    pub tcpi: Decimal,
    pub forecast_final_cost: Decimal,
    pub forecast_final_value: Decimal,
    pub fee: Decimal,
    pub health: String,
}

/// One persisted cost-to-complete forecast per (job, period).
#[derive(Debug, Clone)]
pub struct Forecast {
    pub id: Option<i64>,
    pub job_id: i64,
    /// Format: "YYYY-MM"
    pub period: String,
    /// 1-based month count from the job's start month.
    pub month_number: i64,
    pub progress_report_id: Option<i64>,
    pub status: ForecastStatus,
    pub archived: bool,
    pub summary: ForecastSummary,
    pub created_at: String,
    pub updated_at: String,
    pub submitted_by: String,
    pub submitted_at: String,
    pub approved_by: String,
    pub approved_at: String,
}

impl Forecast {
    pub fn new(job_id: i64, period: String, month_number: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: None,
            job_id,
            period,
            month_number,
            progress_report_id: None,
            status: ForecastStatus::Draft,
            archived: false,
            summary: ForecastSummary::default(),
            created_at: now.clone(),
            updated_at: now,
            submitted_by: String::new(),
            submitted_at: String::new(),
            approved_by: String::new(),
            approved_at: String::new(),
        }
    }
}

/// Denormalized forecast detail, one row per (area, system) group.
#[derive(Debug, Clone)]
pub struct ForecastLine {
    pub id: Option<i64>,
    pub forecast_id: i64,
    pub area: String,
    pub system: String,
    pub budget_cost: Decimal,
    pub budget_value: Decimal,
    pub cost_to_date: Decimal,
    pub earned_to_date: Decimal,
    pub forecast_final_cost: Decimal,
    pub forecast_final_value: Decimal,
}
