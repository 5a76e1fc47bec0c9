use chrono::NaiveDate;
use pnl_normalizer::*;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn fixed_options() -> ParseOptions {
    ParseOptions::default().with_upload_date(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap())
}

fn write_csv(dir: &Path, name: &str, rows: &[&[&str]]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path).unwrap();
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    for row in rows {
        let mut record: Vec<&str> = row.to_vec();
        record.resize(width, "");
        writer.write_record(&record).unwrap();
    }
    writer.flush().unwrap();
    path
}

fn title_block() -> Vec<&'static [&'static str]> {
    vec![
        &["Harbour Consulting Ltd"],
        &["Profit and Loss"],
        &["For the month ended 31 March 2024"],
        &["Accrual Basis"],
        &[""],
    ]
}

fn trading_income(stated_total: &'static str) -> Vec<&'static [&'static str]> {
    let total: &'static [&'static str] = match stated_total {
        "15000" => &["Total Trading Income", "15000"],
        "14000" => &["Total Trading Income", "14000"],
        _ => &["Total Trading Income", ""],
    };
    vec![
        &["Trading Income", ""],
        &["Consulting Fees", "10000"],
        &["Product Sales", "5000"],
        total,
    ]
}

fn full_report_rows() -> Vec<&'static [&'static str]> {
    let mut rows = title_block();
    rows.extend(trading_income("15000"));
    rows.extend::<Vec<&'static [&'static str]>>(vec![
        &["Cost of Sales", ""],
        &["Purchases", "5000"],
        &["Freight", "1000"],
        &["Total Cost of Sales", "6000"],
        &["Gross Profit", "9000"],
        &["Operating Expenses", ""],
        &["Rent", "1500"],
        &["Wages and Salaries", "3000"],
        &["Advertising", "900"],
        &["Bank Fees", "100"],
        &["Total Operating Expenses", "5500"],
        &["Net Profit", "3500"],
    ]);
    rows
}

#[test]
fn test_scenario_explicit_total_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "march.csv", &full_report_rows());

    let report = ProfitLossParser::with_defaults()
        .unwrap()
        .parse_file(&path, &fixed_options())
        .unwrap();

    let income = report.section(Section::TradingIncome).unwrap();
    assert_eq!(income.accounts.len(), 2);
    assert_eq!(income.accounts[0].name, "Consulting Fees");
    assert_eq!(income.accounts[0].value, 10000.0);
    assert_eq!(income.accounts[1].value, 5000.0);
    assert_eq!(income.total, 15000.0);
    assert_eq!(income.total_source, TotalSource::Explicit);

    assert_eq!(report.company_name, "Harbour Consulting Ltd");
    assert_eq!(report.report_type, ReportType::Complete);
    assert_eq!(report.metadata.source, "march.csv");
    assert_eq!(report.gross_profit(), 9000.0);
    assert_eq!(report.net_profit(), 3500.0);
}

#[test]
fn test_scenario_mismatched_total_is_flagged() {
    let mut rows = title_block();
    rows.extend(trading_income("14000"));
    let grid = CellGrid::from_text_rows(rows);

    let report = parse_profit_loss_grid(&grid, &fixed_options()).unwrap();
    let income = report.section(Section::TradingIncome).unwrap();

    assert_eq!(income.total_source, TotalSource::Inconsistent);
    assert_eq!(income.total, 14000.0);
    assert_eq!(income.accounts_sum(), 15000.0);
    assert_eq!(income.accounts[0].value, 10000.0);
    assert_eq!(income.accounts[1].value, 5000.0);
    assert!(report.has_inconsistencies());
    assert!(report.warnings.contains(&ValidationWarning::InconsistentTotal {
        section: Section::TradingIncome,
        stated: 14000.0,
        computed: 15000.0,
    }));
}

#[test]
fn test_scenario_partial_report_from_gross_profit_row() {
    let mut rows = title_block();
    rows.extend::<Vec<&'static [&'static str]>>(vec![
        &["Gross Profit", "8000"],
        &["Operating Expenses", ""],
        &["Rent", "1000"],
        &["Wages", "2000"],
    ]);
    let grid = CellGrid::from_text_rows(rows);

    let report = parse_profit_loss_grid(&grid, &fixed_options()).unwrap();

    assert_eq!(report.report_type, ReportType::Partial);
    assert_eq!(report.gross_profit(), 8000.0);
    assert_eq!(report.profit_sources.gross_profit, TotalSource::Explicit);
    assert_eq!(report.section(Section::OperatingExpenses).unwrap().total, 3000.0);
    assert_eq!(report.net_profit(), 5000.0);
    assert!(report
        .warnings
        .contains(&ValidationWarning::MissingSection { section: Section::TradingIncome }));
    assert!(report
        .warnings
        .contains(&ValidationWarning::MissingSection { section: Section::CostOfSales }));
}

#[test]
fn test_scenario_bank_fees_are_administrative() {
    let grid = CellGrid::from_text_rows(full_report_rows());
    let report = parse_profit_loss_grid(&grid, &fixed_options()).unwrap();

    let bank_fees = report
        .section(Section::OperatingExpenses)
        .unwrap()
        .accounts
        .iter()
        .find(|a| a.name == "Bank Fees")
        .unwrap();
    assert_eq!(bank_fees.code, None);
    assert_eq!(bank_fees.category, Some(Category::Administrative));
}

#[test]
fn test_scenario_empty_spreadsheet_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    std::fs::write(&path, "").unwrap();

    let err = analyze_profit_loss(&path).unwrap_err();
    assert!(matches!(err, PnlError::MalformedReport(_)), "{}", err);

    let headerless = write_csv(
        dir.path(),
        "notes.csv",
        &[&["Meeting notes"], &["Nothing", "12"], &["to see here"]],
    );
    let err = analyze_profit_loss(&headerless).unwrap_err();
    assert!(matches!(err, PnlError::MalformedReport(_)), "{}", err);
}

#[test]
fn test_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.csv");
    assert!(matches!(
        analyze_profit_loss(&missing),
        Err(PnlError::UnreadableFile { .. })
    ));

    let unsupported = dir.path().join("report.pdf");
    std::fs::write(&unsupported, "%PDF-1.4").unwrap();
    assert!(matches!(
        analyze_profit_loss(&unsupported),
        Err(PnlError::UnreadableFile { .. })
    ));

    let corrupt = dir.path().join("report.xlsx");
    std::fs::write(&corrupt, "not a zip archive").unwrap();
    assert!(matches!(
        analyze_profit_loss(&corrupt),
        Err(PnlError::UnreadableFile { .. })
    ));
}

#[test]
fn test_xlsx_with_codes_and_numeric_cells() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("export.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Profit & Loss")?;
    sheet.write_string(1, 0, "Kiwi Widgets Limited")?;
    sheet.write_string(2, 0, "1 Jan 2024 to 31 Mar 2024")?;
    sheet.write_string(3, 0, "Cash Basis")?;

    sheet.write_string(5, 0, "Revenue")?;
    sheet.write_number(6, 0, 4000.0)?;
    sheet.write_string(6, 1, "Widget Sales")?;
    sheet.write_number(6, 2, 12000.0)?;
    sheet.write_number(7, 0, 4100.0)?;
    sheet.write_string(7, 1, "Service Revenue")?;
    sheet.write_number(7, 2, 3000.0)?;

    sheet.write_string(8, 0, "Cost of Goods Sold")?;
    sheet.write_string(9, 1, "5000 - Materials")?;
    sheet.write_number(9, 2, 6000.0)?;

    sheet.write_string(10, 0, "Gross Profit")?;
    sheet.write_number(10, 2, 9000.0)?;

    sheet.write_string(11, 0, "Overheads")?;
    sheet.write_string(12, 0, "6100")?;
    sheet.write_string(12, 1, "Office Rent")?;
    sheet.write_number(12, 2, 2000.0)?;
    sheet.write_string(13, 0, "6200")?;
    sheet.write_string(13, 1, "Electricity")?;
    sheet.write_number(13, 2, 500.0)?;
    sheet.write_string(14, 0, "Total Overheads")?;
    sheet.write_number(14, 2, 2500.0)?;

    sheet.write_string(15, 0, "Net Profit")?;
    sheet.write_number(15, 2, 6500.0)?;
    workbook.save(&path)?;

    let report = analyze_profit_loss_with(
        &path,
        &ParserConfig::default(),
        &fixed_options().with_currency("NZD"),
    )?;

    assert_eq!(report.company_name, "Kiwi Widgets Limited");
    assert_eq!(report.period, "1 Jan 2024 To 31 Mar 2024");
    assert_eq!(report.basis_type, BasisType::Cash);
    assert_eq!(report.metadata.currency, "NZD");

    let income = report.section(Section::TradingIncome).unwrap();
    assert_eq!(income.accounts[0].code.as_deref(), Some("4000"));
    assert_eq!(income.accounts[0].name, "Widget Sales");
    assert_eq!(income.total, 15000.0);
    assert_eq!(income.total_source, TotalSource::Computed);

    let costs = report.section(Section::CostOfSales).unwrap();
    assert_eq!(costs.accounts[0].code.as_deref(), Some("5000"));
    assert_eq!(costs.accounts[0].name, "Materials");
    assert_eq!(costs.accounts[0].category, Some(Category::DirectCosts));

    let expenses = report.section(Section::OperatingExpenses).unwrap();
    assert_eq!(expenses.total_source, TotalSource::Explicit);
    assert_eq!(expenses.accounts[1].code.as_deref(), Some("6200"));
    assert_eq!(expenses.accounts[1].category, Some(Category::Utilities));

    assert_eq!(report.gross_profit(), 9000.0);
    assert_eq!(report.net_profit(), 6500.0);
    assert!(!report.has_inconsistencies());
    Ok(())
}

#[test]
fn test_parsing_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "march.csv", &full_report_rows());
    let parser = ProfitLossParser::with_defaults().unwrap();

    let first = parser.parse_file(&path, &fixed_options()).unwrap();
    let second = parser.parse_file(&path, &fixed_options()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_totals_follow_their_provenance() {
    let mut rows = full_report_rows();
    rows.push(&["Operating Expenses", ""]);
    rows.push(&["Rent", "1500"]);
    rows.push(&["Rent", "500"]);
    rows.push(&["Insurance", "250"]);
    let grid = CellGrid::from_text_rows(rows);
    let tolerance = Tolerance::default();

    let report = parse_profit_loss_grid(&grid, &fixed_options()).unwrap();
    for (section, result) in report.sections.iter() {
        match result.total_source {
            TotalSource::Computed => assert_eq!(result.total, result.accounts_sum(), "{}", section),
            TotalSource::Explicit => {
                assert!(tolerance.agrees(result.total, result.accounts_sum()), "{}", section)
            }
            TotalSource::Inconsistent => {
                assert!(!tolerance.agrees(result.total, result.accounts_sum()), "{}", section)
            }
        }
    }

    // The repeated header replaces the first Operating Expenses block.
    let expenses = report.section(Section::OperatingExpenses).unwrap();
    assert_eq!(expenses.accounts.len(), 2);
    assert_eq!(expenses.accounts[0].value, 2000.0);
    assert_eq!(expenses.total, 2250.0);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, ValidationWarning::DuplicateSectionHeader { .. })));
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, ValidationWarning::MergedDuplicateAccount { occurrences: 2, .. })));
}

#[test]
fn test_group_headings_and_reworded_totals_reconcile() {
    let mut rows = title_block();
    rows.extend::<Vec<&'static [&'static str]>>(vec![
        &["Income", ""],
        &["Consulting", "500"],
        &["Sales", ""],
        &["Product Sales", "100"],
        &["Total Sales", "100"],
        &["Total Income", "600"],
        &["Less Cost of Sales", ""],
        &["Purchases", "40"],
        &["Cost of Sales", "40"],
        &["Gross Profit", "560"],
    ]);

    let report =
        parse_profit_loss_grid(&CellGrid::from_text_rows(rows), &fixed_options()).unwrap();

    let income = report.section(Section::TradingIncome).unwrap();
    assert_eq!(income.accounts.len(), 2);
    assert_eq!(income.total, 600.0);
    assert_eq!(income.total_source, TotalSource::Explicit);

    let costs = report.section(Section::CostOfSales).unwrap();
    assert_eq!(costs.accounts.len(), 1);
    assert_eq!(costs.accounts[0].name, "Purchases");
    assert_eq!(costs.total, 40.0);
    assert_eq!(costs.total_source, TotalSource::Explicit);

    assert!(!report.warnings.iter().any(|w| matches!(
        w,
        ValidationWarning::InconsistentTotal { .. }
            | ValidationWarning::DuplicateSectionHeader { .. }
            | ValidationWarning::UnassignedRow { .. }
    )));
}

#[test]
fn test_report_type_tracks_sections() {
    let complete =
        parse_profit_loss_grid(&CellGrid::from_text_rows(full_report_rows()), &fixed_options())
            .unwrap();
    assert_eq!(complete.report_type, ReportType::Complete);
    assert!(complete.sections.trading_income.is_some());
    assert!(complete.sections.cost_of_sales.is_some());

    let mut rows = title_block();
    rows.extend(trading_income("15000"));
    rows.extend::<Vec<&'static [&'static str]>>(vec![
        &["Operating Expenses", ""],
        &["Rent", "1000"],
    ]);
    let partial =
        parse_profit_loss_grid(&CellGrid::from_text_rows(rows), &fixed_options()).unwrap();
    assert_eq!(partial.report_type, ReportType::Partial);
    assert_eq!(partial.gross_profit(), 15000.0);
    assert_eq!(partial.net_profit(), 14000.0);
}

#[test]
fn test_categories_do_not_depend_on_order() {
    let classifier = CategoryClassifier::from_config(&ParserConfig::default());
    let names = ["Bank Fees", "Sales Commission", "Office Rent", "Accounting Fees", "Mystery"];

    let forward: Vec<_> = names.iter().map(|n| classifier.classify(n, None)).collect();
    let backward: Vec<_> = names.iter().rev().map(|n| classifier.classify(n, None)).collect();
    let reversed: Vec<_> = backward.into_iter().rev().collect();

    assert_eq!(forward, reversed);
    assert_eq!(forward[0], Some(Category::Administrative));
    assert_eq!(forward[4], None);
}

#[test]
fn test_rows_outside_sections_are_reported() {
    let mut rows = title_block();
    rows.extend(trading_income("15000"));
    rows.extend::<Vec<&'static [&'static str]>>(vec![
        &["Gross Profit", "15000"],
        &["Interest Received", "50"],
        &["Operating Expenses", ""],
        &["Rent", "1000"],
    ]);
    let report = parse_profit_loss_grid(&CellGrid::from_text_rows(rows), &fixed_options()).unwrap();

    assert!(report.warnings.iter().any(|w| matches!(
        w,
        ValidationWarning::UnassignedRow { text, .. } if text == "Interest Received"
    )));
    assert_eq!(report.net_profit(), 14000.0);
}

#[test]
fn test_concurrent_parses_share_one_parser() {
    let parser = Arc::new(ProfitLossParser::with_defaults().unwrap());
    let grid = Arc::new(CellGrid::from_text_rows(full_report_rows()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let parser = Arc::clone(&parser);
            let grid = Arc::clone(&grid);
            std::thread::spawn(move || parser.parse_grid(&grid, &fixed_options()).unwrap())
        })
        .collect();

    let reports: Vec<FinancialReport> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for report in &reports[1..] {
        assert_eq!(report, &reports[0]);
    }
}

#[test]
fn test_metrics_and_insights_end_to_end() {
    let report =
        parse_profit_loss_grid(&CellGrid::from_text_rows(full_report_rows()), &fixed_options())
            .unwrap();
    let metrics = calculate_metrics(&report);

    assert_eq!(metrics.total_income, 15000.0);
    assert_eq!(metrics.gross_profit_margin, Ratio::Value(60.0));
    assert_eq!(metrics.cost_of_sales_pct, Ratio::Value(40.0));
    assert!(metrics.net_profit_margin.is_defined());

    let outcome = generate_insights(&RuleBasedInsights::default(), &report, &metrics);
    let insights = outcome.report().unwrap();
    assert_eq!(insights.generated_by, "rules");
    assert!(insights.summary.contains("Harbour Consulting Ltd"));
    assert!(insights
        .insights
        .iter()
        .any(|i| i.kind == InsightKind::Strength));

    let totals = category_totals(&report, Some(Section::OperatingExpenses));
    assert_eq!(totals.get("Occupancy"), Some(&1500.0));
    assert_eq!(totals.get("Payroll"), Some(&3000.0));
}

#[test]
fn test_schema_generation() {
    let schema = FinancialReport::schema_as_json().unwrap();
    assert!(schema.contains("companyName"));
    assert!(schema.contains("totalSource"));

    let config_schema = ParserConfig::schema_as_json().unwrap();
    assert!(config_schema.contains("tolerance"));
}

#[test]
fn test_config_round_trips_through_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parser.json");

    let mut config = ParserConfig::default();
    config.default_currency = "AUD".to_string();
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = ParserConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded, config);

    let csv_path = write_csv(dir.path(), "march.csv", &full_report_rows());
    let report = analyze_profit_loss_with(&csv_path, &loaded, &fixed_options()).unwrap();
    assert_eq!(report.metadata.currency, "AUD");
}
