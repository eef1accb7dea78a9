use std::sync::Arc;

use altscore::config::AppConfig;
use altscore::error::AppError;
use altscore::report::{DashboardView, ScoreReport};
use altscore::scoring::{CreditScorer, RawApplicant};
use altscore::service::ApplicantService;
use altscore::store::CsvRecordStore;
use clap::Args;

/// Raw applicant fields as they would arrive from the intake form. Every value is a
/// string on purpose; the strict normalizer owns all coercion and rejection.
#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Employment category: gig, salaried, or self_employed
    #[arg(long, default_value = "salaried")]
    pub(crate) employment_type: String,
    /// Monthly income bracket: 0-15000, 10000-30000, 30000-50000, or 50000-100000
    #[arg(long, default_value = "10000-30000")]
    pub(crate) income_range: String,
    /// City tier, 1 to 3
    #[arg(long, default_value = "2")]
    pub(crate) city_tier: String,
    /// Age of the oldest bank account in months
    #[arg(long, default_value = "24")]
    pub(crate) bank_account_age_months: String,
    /// Number of active bank accounts
    #[arg(long, default_value = "2")]
    pub(crate) num_bank_accounts: String,
    /// Monthly income in rupees
    #[arg(long, default_value = "30000")]
    pub(crate) monthly_income: String,
    /// Whether the applicant pays rent (yes/no)
    #[arg(long, default_value = "yes")]
    pub(crate) pays_rent: String,
    /// Fraction of rent payments made on time, 0.0 to 1.0
    #[arg(long, default_value = "0.9")]
    pub(crate) rent_paid_on_time: String,
    /// Average utility payment delay in days
    #[arg(long, default_value = "0")]
    pub(crate) utility_delay_days: String,
    /// UPI transactions per month
    #[arg(long, default_value = "20")]
    pub(crate) upi_txn_count: String,
    /// Average month-end account balance in rupees
    #[arg(long, default_value = "5000")]
    pub(crate) avg_month_end_balance: String,
    /// Whether an overdraft occurred in the last year (yes/no)
    #[arg(long, default_value = "no")]
    pub(crate) overdraft_event: String,
    /// Persist the scored record to the data file
    #[arg(long)]
    pub(crate) save: bool,
}

impl ScoreArgs {
    fn into_raw(self) -> (RawApplicant, bool) {
        let save = self.save;
        let raw = RawApplicant {
            employment_type: self.employment_type,
            income_range: self.income_range,
            city_tier: self.city_tier,
            bank_account_age_months: self.bank_account_age_months,
            num_bank_accounts: self.num_bank_accounts,
            monthly_income: self.monthly_income,
            pays_rent: self.pays_rent,
            rent_paid_on_time: self.rent_paid_on_time,
            utility_delay_days: self.utility_delay_days,
            upi_txn_count: self.upi_txn_count,
            avg_month_end_balance: self.avg_month_end_balance,
            overdraft_event: self.overdraft_event,
        };
        (raw, save)
    }
}

fn build_service(config: &AppConfig) -> Result<ApplicantService<CsvRecordStore>, AppError> {
    let scorer = Arc::new(CreditScorer::load(&config.models)?);
    let store = Arc::new(CsvRecordStore::new(config.store.data_file.clone()));
    Ok(ApplicantService::new(scorer, store))
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_service(&config)?;
    let (raw, save) = args.into_raw();

    let report = if save {
        let outcome = service.register(&raw)?;
        println!(
            "Saved applicant {} at {}",
            outcome.user_id,
            outcome.scored_at.format("%Y-%m-%d %H:%M:%S")
        );
        ScoreReport::from_result(Some(outcome.user_id), &outcome.score)
    } else {
        let (_, score) = service.preview(&raw)?;
        ScoreReport::from_result(None, &score)
    };

    render_score_report(&report);
    Ok(())
}

pub(crate) fn run_dashboard() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_service(&config)?;
    let view = service.dashboard()?;
    render_dashboard(&view);
    Ok(())
}

pub(crate) fn run_delete_last() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = CsvRecordStore::new(config.store.data_file.clone());
    let service = ApplicantService::new(Arc::new(CreditScorer::load(&config.models)?), Arc::new(store));

    match service.remove_last()? {
        Some(user_id) => println!("Removed last record: {user_id}"),
        None => println!("Record store is empty; nothing removed"),
    }
    Ok(())
}

fn render_score_report(report: &ScoreReport) {
    println!("\nAlternative credit score report");
    if let Some(user_id) = &report.user_id {
        println!("Applicant: {user_id}");
    }
    for row in &report.rows {
        println!(
            "- {}: {} (sub-score {:.1})",
            row.model, row.output, row.sub_score
        );
    }
    if !report.class_probabilities.is_empty() {
        println!("Class probabilities:");
        for (class, probability) in &report.class_probabilities {
            println!("  - {class}: {:.1}%", probability * 100.0);
        }
    }
    println!(
        "Final score: {} / 100 | {} | {}",
        report.final_score, report.risk_label, report.verdict_label
    );
}

fn render_dashboard(view: &DashboardView) {
    println!("\nApplicant dashboard");
    println!(
        "- {} records | average score {:.1} | {} eligible | {} risky",
        view.summary.total_records,
        view.summary.average_score,
        view.summary.eligible_count,
        view.summary.risky_count
    );

    if view.recent.is_empty() {
        println!("No records saved yet.");
        return;
    }

    println!("Most recent submissions:");
    for row in &view.recent {
        println!(
            "  - {} | {} | {} | income {:.0} | score {} ({})",
            row.user_id,
            row.employment_type,
            row.income_range,
            row.monthly_income,
            row.alt_credit_score,
            row.risk_label
        );
    }

    println!("Top scores:");
    for row in view.ranked.iter().take(5) {
        println!(
            "  - {} | score {} ({})",
            row.user_id, row.alt_credit_score, row.risk_label
        );
    }

    println!("Live model re-predictions:");
    for prediction in &view.live_predictions {
        let label = prediction.classifier_label.as_deref().unwrap_or("-");
        let fmt = |value: Option<f64>| {
            value
                .map(|v| format!("{v:.1}"))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "  - {} | {} | A {} | B {} | blended {}",
            prediction.user_id,
            label,
            fmt(prediction.regressor_a_score),
            fmt(prediction.regressor_b_score),
            prediction
                .blended_score
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        for error in &prediction.errors {
            println!("    ! {error}");
        }
    }
}
