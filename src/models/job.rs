use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Option<i64>,
    /// Contract/job number, e.g. "24-017".
    pub number: String,
    pub name: String,
    /// Format: "YYYY-MM-DD"
    pub start_date: String,
    pub end_date: String,
    pub contract_value: Decimal,
    pub created_at: String,
}

impl Job {
    pub fn new(
        number: String,
        name: String,
        start_date: String,
        end_date: String,
        contract_value: Decimal,
    ) -> Self {
        Self {
            id: None,
            number,
            name,
            start_date,
            end_date,
            contract_value,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// First calendar month of the job, "YYYY-MM".
    pub fn start_month(&self) -> &str {
        month_of(&self.start_date)
    }

    pub fn end_month(&self) -> &str {
        month_of(&self.end_date)
    }

    /// Whether a "YYYY-MM" month falls inside the job's duration.
    pub fn contains_month(&self, month: &str) -> bool {
        self.start_month() <= month && month <= self.end_month()
    }
}

/// The "YYYY-MM" prefix of an ISO date string.
pub fn month_of(date: &str) -> &str {
    date.get(..7).unwrap_or(date)
}
