use rust_decimal::Decimal;

/// Errors surfaced to callers of the forecasting engine.
///
/// Storage failures wrap `anyhow::Error` and abort the whole computation;
/// everything else is a client error the CLI reports without a stack trace.
#[derive(Debug, thiserror::Error)]
pub(crate) enum EngineError {
    #[error("job '{0}' not found")]
    JobNotFound(String),

    #[error("progress report {0} not found")]
    ReportNotFound(i64),

    #[error("invalid forecast period '{period}': {reason}")]
    InvalidPeriod { period: String, reason: String },

    #[error("no saved forecast for period {0}")]
    ForecastNotFound(String),

    #[error(
        "progress report {report_id} is already linked to forecast {forecast_id} (period {period})"
    )]
    ReportInUse {
        report_id: i64,
        forecast_id: i64,
        period: String,
    },

    #[error("forecast cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invoice allocations sum to {allocated} but the invoice total is {total}")]
    AllocationMismatch { allocated: Decimal, total: Decimal },

    #[error("approved progress for {group} ({amount}) exceeds its budget value ({budget})")]
    ProgressExceedsBudget {
        group: String,
        amount: Decimal,
        budget: Decimal,
    },

    #[error("job '{0}' has no approved progress reports")]
    NoApprovedProgress(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
