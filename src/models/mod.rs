mod budget_line;
mod cost_record;
mod forecast;
mod job;
mod progress;

pub use budget_line::BudgetLine;
pub use cost_record::{Invoice, InvoiceAllocation, InvoiceStatus, LaborEntry, LaborStatus};
pub use forecast::{BudgetHealth, Forecast, ForecastLine, ForecastStatus, ForecastSummary};
pub use job::{month_of, Job};
pub use progress::{ProgressLine, ProgressReport, ProgressStatus};
