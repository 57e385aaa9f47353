use std::path::Path;

use chrono::NaiveDate;
use clap::ValueEnum;
use orderlens_core::analytics::{
    AnalyticsEngine, CategoryShare, ConversionSummary, DashboardDay, GroupBreakdown,
    LinkTypeSummary, ProductRanking, RankBy, ReturnsAnalysis,
};
use orderlens_core::config::AppConfig;
use orderlens_core::domain::DateRange;
use orderlens_core::errors::ApplicationError;
use orderlens_core::ingest::SpreadsheetIngestor;
use serde::Serialize;

use crate::commands::{input_failure, read_input, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Conversion,
    Devices,
    LinkTypes,
    Sellers,
    Returns,
    TopProducts,
    Categories,
    Dashboard,
}

impl ReportKind {
    fn label(self) -> &'static str {
        match self {
            Self::Conversion => "conversion",
            Self::Devices => "devices",
            Self::LinkTypes => "link-types",
            Self::Sellers => "sellers",
            Self::Returns => "returns",
            Self::TopProducts => "top-products",
            Self::Categories => "categories",
            Self::Dashboard => "dashboard",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnalyticsRequest {
    pub report: ReportKind,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub rank_by: RankBy,
    /// Falls back to `analytics.top_n`.
    pub limit: Option<usize>,
}

pub fn run(config: &AppConfig, workbook: &Path, request: &AnalyticsRequest) -> CommandResult {
    let bytes = match read_input(workbook) {
        Ok(bytes) => bytes,
        Err(error) => return input_failure("analytics", error),
    };

    match compute(config, &bytes, request) {
        Ok(report) => CommandResult::success_with(
            "analytics",
            format!("{} report computed", request.report.label()),
            report,
        ),
        Err(error) => CommandResult::from_error("analytics", error),
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Report {
    Conversion(ConversionSummary),
    Groups(Vec<GroupBreakdown>),
    LinkTypes { breakdown: Vec<GroupBreakdown>, summary: LinkTypeSummary },
    Returns(ReturnsAnalysis),
    TopProducts(Vec<ProductRanking>),
    Categories(Vec<CategoryShare>),
    Dashboard(Vec<DashboardDay>),
}

#[derive(Debug, Serialize)]
struct AnalyticsOutput {
    range: DateRange,
    report: Report,
}

fn compute(
    config: &AppConfig,
    bytes: &[u8],
    request: &AnalyticsRequest,
) -> Result<AnalyticsOutput, ApplicationError> {
    let dataset = SpreadsheetIngestor::new().parse(bytes)?;
    let engine = AnalyticsEngine::from_config(&config.analytics);
    let range = engine.resolve_range(&dataset, request.from, request.to)?;
    let limit = request.limit.unwrap_or(config.analytics.top_n);

    let report = match request.report {
        ReportKind::Conversion => {
            Report::Conversion(engine.compute_conversion(dataset.daily_trends(), range))
        }
        ReportKind::Devices => {
            Report::Groups(engine.compute_device_breakdown(dataset.earnings(), range))
        }
        ReportKind::LinkTypes => Report::LinkTypes {
            breakdown: engine.compute_link_type_breakdown(dataset.earnings(), range),
            summary: engine.summarize_link_types(dataset.link_types()),
        },
        ReportKind::Sellers => {
            Report::Groups(engine.compute_seller_breakdown(dataset.earnings(), range))
        }
        ReportKind::Returns => {
            Report::Returns(engine.compute_returns_analysis(dataset.earnings(), range, limit))
        }
        ReportKind::TopProducts => Report::TopProducts(engine.compute_top_products(
            dataset.earnings(),
            dataset.orders(),
            range,
            limit,
            request.rank_by,
        )),
        ReportKind::Categories => {
            Report::Categories(engine.compute_category_distribution(dataset.orders(), range))
        }
        ReportKind::Dashboard => Report::Dashboard(engine.compute_daily_dashboard(&dataset, range)),
    };

    Ok(AnalyticsOutput { range, report })
}
