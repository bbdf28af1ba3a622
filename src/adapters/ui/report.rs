//! Plain-text rendering of use-case results for the CLI and the menu.

use crate::domain::risk::RiskMetrics;
use crate::domain::{JobOutcome, JobRecord, RefreshReport, RegisteredModel, TableInfo};
use crate::shared::format::{format_currency, format_large_number, format_percentage};
use crate::usecases::model_service::ForecastRun;
use crate::usecases::processor::ValidationReport;
use crate::usecases::{PipelineReport, PipelineStatus};
use crate::usecases::ingest_service::FeedResult;

fn value(v: f64, electricity: bool) -> String {
    if electricity {
        format_large_number(v, "MW")
    } else {
        format_currency(v, "USD")
    }
}

pub fn print_refresh(report: &RefreshReport) {
    println!(
        "Refresh: {} succeeded, {} failed, {} files written",
        report.succeeded,
        report.failed,
        report
            .files_written
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string())
    );
}

pub fn print_job_outcome(outcome: &JobOutcome) {
    match &outcome.commit {
        Some(commit) => println!(
            "Committed {} ({})",
            commit,
            if outcome.merged { "merged into stable" } else { "not merged" }
        ),
        None => println!("No changes to commit"),
    }
}

pub fn print_job_record(record: Option<&JobRecord>, next: Option<chrono::DateTime<chrono::Utc>>) {
    match record {
        Some(r) => {
            println!("Last run:  {} -> {}", r.started_at, r.finished_at);
            match (&r.outcome, &r.error) {
                (Some(o), _) => print_job_outcome(o),
                (None, Some(e)) => println!("Failed:    {}", e),
                (None, None) => {}
            }
        }
        None => println!("Last run:  never"),
    }
    if let Some(next) = next {
        println!("Next run:  {}", next);
    }
}

pub fn print_pipeline(report: &PipelineReport) {
    let status = match report.status {
        PipelineStatus::Completed => "completed",
        PipelineStatus::Failed => "failed",
    };
    println!(
        "Pipeline {} [{}]: {} raw -> {} processed",
        report.commodity, status, report.raw_records, report.processed_records
    );
    if let Some(q) = &report.quality_report {
        println!("  duplicates: {}", q.duplicate_records);
        if let Some((start, end)) = q.date_range {
            println!("  range: {} .. {}", start, end);
        }
        for (col, stats) in &q.anomalies {
            if stats.outliers_count > 0 {
                println!(
                    "  {}: {} outliers ({})",
                    col,
                    stats.outliers_count,
                    format_percentage(stats.outliers_percentage, 1)
                );
            }
        }
    }
    if let Some(e) = &report.error {
        println!("  error: {}", e);
    }
}

pub fn print_forecast(run: &ForecastRun) {
    let electricity = run.commodity == "electricity";
    println!(
        "Forecast {}{} from {} observations",
        run.commodity,
        run.region
            .as_deref()
            .map(|r| format!(" ({})", r))
            .unwrap_or_default(),
        run.observations
    );
    for (p, e) in run.points.iter().zip(&run.ensemble) {
        println!(
            "  t+{:<3} {:>12}  [{} .. {}]  ensemble {}",
            p.step,
            value(p.value, electricity),
            value(p.lower, electricity),
            value(p.upper, electricity),
            value(*e, electricity)
        );
    }
    if let Some(m) = &run.metrics {
        println!(
            "  holdout: rmse {:.4}, mae {:.4}, mape {}, r2 {:.3}, direction {}",
            m.rmse,
            m.mae,
            format_percentage(m.mape, 1),
            m.r2,
            format_percentage(m.directional_accuracy * 100.0, 0)
        );
    }
    if let Some(id) = &run.model_id {
        println!("  registered as {}", id);
    }
}

pub fn print_models(models: &[RegisteredModel]) {
    if models.is_empty() {
        println!("No registered models");
        return;
    }
    for m in models {
        let rmse = m
            .performance_metrics
            .get("rmse")
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {}  rmse {}{}",
            m.model_id,
            m.model_type,
            m.created_date.format("%Y-%m-%d %H:%M"),
            rmse,
            if m.is_active { "" } else { "  (inactive)" }
        );
    }
}

pub fn print_risk(symbol: &str, m: &RiskMetrics) {
    println!("Risk {}", symbol);
    println!("  VaR 95%:            {}", format_percentage(m.var_95 * 100.0, 2));
    println!("  Expected shortfall: {}", format_percentage(m.expected_shortfall * 100.0, 2));
    println!("  Volatility (ann.):  {}", format_percentage(m.volatility * 100.0, 1));
    println!("  Max drawdown:       {}", format_percentage(m.max_drawdown * 100.0, 1));
    if let Some(s) = m.sharpe_ratio {
        println!("  Sharpe:             {:.2}", s);
    }
    if let Some(b) = m.beta {
        println!("  Beta vs XLE:        {:.2}", b);
    }
}

pub fn print_validation(symbol: &str, report: &ValidationReport) {
    println!(
        "{}: {}",
        symbol,
        if report.is_valid { "valid" } else { "INVALID" }
    );
    for issue in &report.issues {
        println!("  issue: {}", issue);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    println!("  anomalies: {}", report.anomalies);
    if let Some(s) = &report.statistics {
        println!(
            "  mean {}  median {}  min {}  max {}",
            format_currency(s.mean, "USD"),
            format_currency(s.median, "USD"),
            format_currency(s.min, "USD"),
            format_currency(s.max, "USD")
        );
    }
}

pub fn print_table_info(table: &str, info: &TableInfo) {
    if !info.exists {
        println!("{}: does not exist", table);
        return;
    }
    println!("{}: {} rows", table, info.row_count);
    for c in &info.columns {
        println!("  {:<20} {}", c.name, c.column_type);
    }
}

pub fn print_ingest(results: &[FeedResult]) {
    for r in results {
        match &r.error {
            None => println!("{:<14} -> {:<20} {} rows", r.feed, r.table, r.rows),
            Some(e) => println!("{:<14} -> {:<20} failed: {}", r.feed, r.table, e),
        }
    }
}
